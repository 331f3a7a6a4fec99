use crate::error::{CertificadoError, Result};
use crate::pdf::fonts::{FontBook, FontSources, FONT_DIR};
use crate::pdf::images::ImageStore;
use crate::pdf::{layout, markup, writer};
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Converts rendered markup into a PDF
pub struct DocumentConverter {
    base_dir: PathBuf,
}

impl DocumentConverter {
    /// `base_dir` anchors relative image references and holds the
    /// optional `fonts/` fallback directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn to_bytes(&self, markup: &str) -> Result<Vec<u8>> {
        let parsed = markup::parse(markup)?;
        let images = ImageStore::load(parsed.image_sources(), &self.base_dir)?;
        let sources = FontSources::with_fallbacks(&self.base_dir.join(FONT_DIR))?;
        let fonts = FontBook::new(&sources)?;
        let laid = layout::layout(&parsed, &images, &fonts);
        debug!("Laid out {} page(s)", laid.pages.len());
        writer::write_pdf(&laid, &images, &fonts, parsed.title.as_deref())
    }

    /// Converts and writes to `output_path`, creating missing parent
    /// directories. The target only appears once the document is complete.
    pub fn write_to(&self, markup: &str, output_path: &Path) -> Result<()> {
        info!("Output will be written to: {}", output_path.display());
        let bytes = self.to_bytes(markup)?;
        write_atomic(output_path, &bytes)?;
        info!("Successfully created: {}", output_path.display());
        Ok(())
    }
}

/// Writes to a temporary file next to `path`, then renames it into place
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".certificado-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path)
        .map_err(|e| CertificadoError::Io(e.error))?;
    Ok(())
}
