use crate::error::{CertificadoError, Result};
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A decoded raster image as 8-bit RGB, with its alpha channel kept
/// separately when any pixel is not fully opaque
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl LoadedImage {
    pub fn decode(bytes: &[u8]) -> image::ImageResult<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        let pixels = rgba.as_raw();
        let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(pixels.len() / 4);
        for px in pixels.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
            alpha.push(px[3]);
        }
        let alpha = alpha.iter().any(|&a| a < u8::MAX).then_some(alpha);

        Ok(Self {
            width,
            height,
            rgb,
            alpha,
        })
    }

    /// Resource name used inside page content streams
    pub fn resource_name(index: usize) -> String {
        format!("Im{}", index)
    }
}

/// Images referenced by a document, loaded once each
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Vec<LoadedImage>,
    index: HashMap<String, usize>,
}

impl ImageStore {
    pub fn load<'a>(sources: impl IntoIterator<Item = &'a str>, base_dir: &Path) -> Result<Self> {
        let mut store = ImageStore::default();
        for src in sources {
            if store.index.contains_key(src) {
                continue;
            }
            let bytes = read_source(src, base_dir)?;
            let image = LoadedImage::decode(&bytes)
                .map_err(|e| CertificadoError::Conversion(format!("cannot decode image {}: {}", src, e)))?;
            debug!("Loaded image {} ({}x{})", src, image.width, image.height);

            store.index.insert(src.to_string(), store.images.len());
            store.images.push(image);
        }
        Ok(store)
    }

    pub fn get(&self, src: &str) -> Option<(usize, &LoadedImage)> {
        let idx = *self.index.get(src)?;
        Some((idx, &self.images[idx]))
    }

    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }
}

/// Reads an image reference: data URI, file URL, or path relative to `base_dir`
fn read_source(src: &str, base_dir: &Path) -> Result<Vec<u8>> {
    if let Some(data) = src.strip_prefix("data:") {
        let (meta, payload) = data
            .split_once(',')
            .ok_or_else(|| CertificadoError::Conversion("malformed data URI".to_string()))?;
        if !meta.ends_with(";base64") {
            return Err(CertificadoError::Conversion(
                "only base64 data URIs are supported".to_string(),
            ));
        }
        return general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| CertificadoError::Conversion(format!("invalid data URI: {}", e)));
    }

    if src.starts_with("http://") || src.starts_with("https://") {
        return Err(CertificadoError::Conversion(format!(
            "remote images are not supported: {}",
            src
        )));
    }

    let path = match src.strip_prefix("file://") {
        Some(rest) => file_url_path(rest),
        None => base_dir.join(src),
    };
    std::fs::read(&path).map_err(|e| {
        CertificadoError::Conversion(format!("cannot read image {}: {}", path.display(), e))
    })
}

/// `file:///C:/x` and `file:///x` both appear in the wild
fn file_url_path(rest: &str) -> PathBuf {
    let bytes = rest.as_bytes();
    let is_drive = bytes.len() > 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic();
    if is_drive {
        PathBuf::from(&rest[1..])
    } else {
        PathBuf::from(rest)
    }
}
