//! Turns raw process arguments into a [`CertificateRequest`].
//!
//! Two call shapes are accepted:
//!
//! * one argument: base64 of a JSON object (`student_name`, `course_name`,
//!   `completion_date`, optional `output_path`)
//! * five arguments: `student_name course_name completion_date legacy output_path`
//!
//! The fourth positional argument is required for compatibility with existing
//! callers but its value is never used.

use crate::error::{CertificadoError, Result};
use crate::template::CertificateRequest;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, warn};

/// Number of arguments in the positional call shape
pub const POSITIONAL_ARITY: usize = 5;

/// A decoded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request: CertificateRequest,
    /// Positional slot four, kept only so it can be logged
    pub legacy: Option<String>,
}

impl Invocation {
    pub fn decode(inputs: &[String]) -> Result<Self> {
        match inputs.len() {
            1 => Ok(Self {
                request: decode_payload(&inputs[0])?,
                legacy: None,
            }),
            n if n >= POSITIONAL_ARITY => {
                if n > POSITIONAL_ARITY {
                    warn!(
                        "Ignoring {} argument(s) beyond the expected {}",
                        n - POSITIONAL_ARITY,
                        POSITIONAL_ARITY
                    );
                }
                let legacy = inputs[3].clone();
                debug!("Ignoring legacy argument: {}", legacy);

                let request = CertificateRequest::new(
                    inputs[0].clone(),
                    inputs[1].clone(),
                    inputs[2].clone(),
                )
                .with_output_path(inputs[4].clone());

                Ok(Self {
                    request,
                    legacy: Some(legacy),
                })
            }
            n => Err(CertificadoError::Argument(format!(
                "expected {} arguments, received {}",
                POSITIONAL_ARITY, n
            ))),
        }
    }
}

/// Decodes a base64 JSON payload
pub fn decode_payload(payload: &str) -> Result<CertificateRequest> {
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CertificadoError::Argument(format!("invalid base64 payload: {}", e)))?;

    let json = String::from_utf8(bytes)
        .map_err(|e| CertificadoError::Argument(format!("payload is not UTF-8: {}", e)))?;

    CertificateRequest::from_json(&json)
}

/// Inverse of [`decode_payload`], for callers building invocations
pub fn encode_payload(request: &CertificateRequest) -> Result<String> {
    let json = serde_json::to_string(request)
        .map_err(|e| CertificadoError::Argument(format!("cannot encode payload: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::OutputMode;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_payload_selects_byte_mode() {
        let json = r#"{"student_name":"João","course_name":"Ervas","completion_date":"10/10/2024"}"#;
        let encoded = general_purpose::STANDARD.encode(json);

        let inv = Invocation::decode(&[encoded]).unwrap();
        assert_eq!(inv.request.student_name, "João");
        assert_eq!(inv.request.course_name, "Ervas");
        assert_eq!(inv.request.completion_date, "10/10/2024");
        assert_eq!(inv.request.mode(), OutputMode::Bytes);
        assert!(inv.legacy.is_none());
    }

    #[test]
    fn test_payload_with_output_path() {
        let req = CertificateRequest::new("A".into(), "B".into(), "C".into()).with_output_path("x/y.pdf");
        let encoded = encode_payload(&req).unwrap();
        let inv = Invocation::decode(&[encoded]).unwrap();
        assert_eq!(inv.request, req);
    }

    #[test]
    fn test_positional_call_shape() {
        let inv = Invocation::decode(&args(&["Ana", "Ervas", "01/01/2024", "file:///img.webp", "out/ana.pdf"])).unwrap();
        assert_eq!(inv.request.student_name, "Ana");
        assert_eq!(inv.request.output_path.as_deref(), Some("out/ana.pdf"));
        assert_eq!(inv.legacy.as_deref(), Some("file:///img.webp"));
    }

    #[test]
    fn test_extra_positionals_are_ignored() {
        let inv = Invocation::decode(&args(&["a", "b", "c", "d", "e.pdf", "f"])).unwrap();
        assert_eq!(inv.request.output_path.as_deref(), Some("e.pdf"));
    }

    #[test]
    fn test_count_mismatch_names_both_counts() {
        let err = Invocation::decode(&args(&["a", "b", "c"])).unwrap_err();
        assert_eq!(err.to_string(), "expected 5 arguments, received 3");

        let err = Invocation::decode(&[]).unwrap_err();
        assert_eq!(err.to_string(), "expected 5 arguments, received 0");
    }

    #[test]
    fn test_invalid_base64() {
        let err = Invocation::decode(&args(&["not base64!"])).unwrap_err();
        assert!(matches!(err, CertificadoError::Argument(_)));
        assert!(err.to_string().starts_with("invalid base64 payload"));
    }

    #[test]
    fn test_invalid_json() {
        let encoded = general_purpose::STANDARD.encode("{student_name:");
        let err = Invocation::decode(&[encoded]).unwrap_err();
        assert!(err.to_string().starts_with("invalid certificate payload"));
    }
}
