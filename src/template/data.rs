use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Data for one certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    #[serde(default)]
    pub student_name: String,

    #[serde(default)]
    pub course_name: String,

    /// Free-form, never parsed as a date
    #[serde(default)]
    pub completion_date: String,

    /// Where to write the PDF; stdout when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// How the finished document leaves the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Bytes,
    File(PathBuf),
}

impl CertificateRequest {
    pub fn new(student_name: String, course_name: String, completion_date: String) -> Self {
        Self {
            student_name,
            course_name,
            completion_date,
            output_path: None,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn mode(&self) -> OutputMode {
        match &self.output_path {
            Some(path) => OutputMode::File(PathBuf::from(path)),
            None => OutputMode::Bytes,
        }
    }

    /// Parses the JSON object carried by an encoded payload
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::error::CertificadoError::Argument(format!("invalid certificate payload: {}", e))
        })
    }
}
