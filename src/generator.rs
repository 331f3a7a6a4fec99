use crate::error::Result;
use crate::pdf::DocumentConverter;
use crate::template::renderer::template_path;
use crate::template::{CertificateRequest, OutputMode, TemplateRenderer};
use log::info;
use std::path::{Path, PathBuf};

/// What a render produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentResult {
    Bytes(Vec<u8>),
    Written(PathBuf),
}

/// Template substitution followed by PDF conversion
pub struct CertificateRenderer {
    template: TemplateRenderer,
    converter: DocumentConverter,
}

impl CertificateRenderer {
    pub fn new(template: TemplateRenderer, converter: DocumentConverter) -> Self {
        Self { template, converter }
    }

    /// Loads `template_name` from `assets_dir`; images resolve against the same directory
    pub fn from_assets(assets_dir: &Path, template_name: &str) -> Result<Self> {
        let template = TemplateRenderer::load(&template_path(assets_dir, template_name))?;
        Ok(Self::new(template, DocumentConverter::new(assets_dir)))
    }

    pub fn render_markup(&self, request: &CertificateRequest) -> Result<String> {
        self.template.render(request)
    }

    pub fn render(&self, request: &CertificateRequest) -> Result<DocumentResult> {
        info!("Rendering certificate for course '{}'", request.course_name);
        let markup = self.render_markup(request)?;

        match request.mode() {
            OutputMode::Bytes => Ok(DocumentResult::Bytes(self.converter.to_bytes(&markup)?)),
            OutputMode::File(path) => {
                self.converter.write_to(&markup, &path)?;
                Ok(DocumentResult::Written(path))
            }
        }
    }
}
