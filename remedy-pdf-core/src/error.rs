use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid object reference: {0} {1} R")]
    InvalidObjectReference(u32, u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid page number: {0}")]
    InvalidPageNumber(u32),

    #[error("Operation cancelled")]
    OperationCancelled,

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("External service timed out: {0}")]
    ExternalServiceTimeout(String),

    #[error("Rasterization error: {0}")]
    Rasterization(String),

    #[error("Remediation step failed: {step}: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl From<crate::parser::ParseError> for PdfError {
    fn from(err: crate::parser::ParseError) -> Self {
        PdfError::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for PdfError {
    fn from(err: serde_json::Error) -> Self {
        PdfError::InvalidInput(format!("invalid JSON: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_error_display() {
        let error = PdfError::InvalidStructure("missing catalog".to_string());
        assert_eq!(error.to_string(), "Invalid PDF structure: missing catalog");
    }

    #[test]
    fn test_step_failed_display() {
        let error = PdfError::StepFailed {
            step: "bookmarks".to_string(),
            reason: "no page tree".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Remediation step failed: bookmarks: no page tree"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);
        match pdf_error {
            PdfError::Io(ref err) => assert_eq!(err.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(
            PdfError::OperationCancelled.to_string(),
            "Operation cancelled"
        );
    }
}
