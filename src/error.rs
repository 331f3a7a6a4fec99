use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertificadoError {
    #[error("{0}")]
    Argument(String),

    #[error("cannot read template asset {}: {source}", path.display())]
    AssetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("document conversion failed: {0}")]
    Conversion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<minijinja::Error> for CertificadoError {
    fn from(e: minijinja::Error) -> Self {
        CertificadoError::Template(e.to_string())
    }
}

impl From<lopdf::Error> for CertificadoError {
    fn from(e: lopdf::Error) -> Self {
        CertificadoError::Conversion(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CertificadoError>;
