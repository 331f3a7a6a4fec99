pub mod data;
pub mod renderer;

pub use data::{CertificateRequest, OutputMode};
pub use renderer::TemplateRenderer;
