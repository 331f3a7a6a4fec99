use crate::error::{CertificadoError, Result};
use crate::template::data::CertificateRequest;
use log::{debug, info, warn};
use minijinja::{context, Environment};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Variables every certificate template is expected to use
pub const TEMPLATE_VARIABLES: [&str; 3] = ["student_name", "course_name", "completion_date"];

/// A loaded certificate template
#[derive(Debug)]
pub struct TemplateRenderer {
    name: String,
    source: String,
    unreferenced: Vec<&'static str>,
}

/// Identifiers used inside the template's `{{ ... }}` expressions
fn printed_identifiers(source: &str) -> HashSet<&str> {
    static EXPRESSION: OnceLock<Regex> = OnceLock::new();
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    let expression = EXPRESSION.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap());
    let identifier = IDENTIFIER.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

    expression
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .flat_map(|body| identifier.find_iter(body.as_str()))
        .map(|m| m.as_str())
        .collect()
}

impl TemplateRenderer {
    /// Reads the template asset from disk
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| CertificadoError::AssetRead {
            path: path.to_path_buf(),
            source,
        })?;

        // The file name decides auto-escaping (.html escapes values)
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template.html".to_string());

        info!("Loaded template: {}", path.display());
        Ok(Self::from_source(name, source))
    }

    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let printed = printed_identifiers(&source);
        let unreferenced = TEMPLATE_VARIABLES
            .iter()
            .copied()
            .filter(|var| !printed.contains(var))
            .collect();
        Self {
            name: name.into(),
            source,
            unreferenced,
        }
    }

    /// Variables from [`TEMPLATE_VARIABLES`] the template never prints
    pub fn unreferenced_variables(&self) -> &[&'static str] {
        &self.unreferenced
    }

    /// Substitutes the request's three values into the template
    pub fn render(&self, request: &CertificateRequest) -> Result<String> {
        for var in &self.unreferenced {
            warn!("Variable '{}' is not used in template {}", var, self.name);
        }

        let mut env = Environment::new();
        env.add_template(&self.name, &self.source)?;
        let template = env.get_template(&self.name)?;

        let rendered = template.render(context! {
            student_name => request.student_name.as_str(),
            course_name => request.course_name.as_str(),
            completion_date => request.completion_date.as_str(),
        })?;

        debug!("Rendered {} bytes of markup", rendered.len());
        Ok(rendered)
    }
}

/// Location of a template inside an assets directory
pub fn template_path(assets_dir: &Path, template_name: &str) -> PathBuf {
    assets_dir.join(template_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CertificateRequest {
        CertificateRequest::new(
            "Maria Souza".to_string(),
            "Formação Herbalista Pro".to_string(),
            "15/03/2024".to_string(),
        )
    }

    #[test]
    fn test_substitutes_all_three_values() {
        let renderer = TemplateRenderer::from_source(
            "certificate.html",
            "<p>{{ student_name }}</p><p>{{ course_name }}</p><p>{{ completion_date }}</p>",
        );
        let out = renderer.render(&request()).unwrap();
        assert_eq!(
            out,
            "<p>Maria Souza</p><p>Formação Herbalista Pro</p><p>15/03/2024</p>"
        );
    }

    #[test]
    fn test_html_templates_escape_values() {
        let renderer = TemplateRenderer::from_source("certificate.html", "<p>{{ course_name }}</p>");
        let mut req = request();
        req.course_name = "Chás & <Infusões>".to_string();
        assert_eq!(
            renderer.render(&req).unwrap(),
            "<p>Chás &amp; &lt;Infusões&gt;</p>"
        );
    }

    #[test]
    fn test_empty_values_render_blank() {
        let renderer = TemplateRenderer::from_source("certificate.html", "[{{ student_name }}]");
        let req = CertificateRequest::default();
        assert_eq!(renderer.render(&req).unwrap(), "[]");
    }

    #[test]
    fn test_malformed_template_is_template_error() {
        let renderer = TemplateRenderer::from_source("certificate.html", "{% if %}");
        let err = renderer.render(&request()).unwrap_err();
        assert!(matches!(err, CertificadoError::Template(_)));
    }

    #[test]
    fn test_unreferenced_variables() {
        let renderer = TemplateRenderer::from_source(
            "certificate.html",
            "{{ student_name | upper }} {{course_name}}",
        );
        assert_eq!(renderer.unreferenced_variables(), ["completion_date"]);
    }

    #[test]
    fn test_reference_check_ignores_text_outside_expressions() {
        let renderer = TemplateRenderer::from_source(
            "certificate.html",
            "<p>student_name course_name</p>{{\n  completion_date\n}}{% if course_name %}{% endif %}",
        );
        assert_eq!(renderer.unreferenced_variables(), ["student_name", "course_name"]);

        let all = TemplateRenderer::from_source(
            "certificate.html",
            "{{ student_name }}{{ course_name ~ completion_date }}",
        );
        assert!(all.unreferenced_variables().is_empty());
    }

    #[test]
    fn test_missing_asset_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateRenderer::load(&dir.path().join("nope.html")).unwrap_err();
        assert!(matches!(err, CertificadoError::AssetRead { .. }));
        assert!(err.to_string().contains("nope.html"));
    }
}
