//! # certificado
//!
//! Renders course completion certificates from an HTML template into PDF,
//! either as raw bytes or as a file at a given path.

pub mod cli;
pub mod error;
pub mod generator;
pub mod output;
pub mod pdf;
pub mod template;

// Re-exports
pub use cli::{Cli, Invocation};
pub use error::{CertificadoError, Result};
pub use generator::{CertificateRenderer, DocumentResult};
pub use pdf::DocumentConverter;
pub use template::{CertificateRequest, OutputMode, TemplateRenderer};
