//! Error types for the paperdrop engine.
//!
//! Each module defines its own focused error enum; this module aggregates
//! them for callers that work across module boundaries. No error in the
//! engine is fatal to the process: the watch coordinator converts every
//! pipeline failure into a log entry and/or a failure result.

use thiserror::Error;

use crate::classify::ClassifyError;
use crate::config::ConfigError;

/// Errors that can occur during engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Settings could not be loaded or saved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The classification service failed.
    #[error("classification error: {0}")]
    Classify(#[from] ClassifyError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_error_display() {
        let err = EngineError::Classify(ClassifyError::Api {
            status: 500,
            message: "internal".to_string(),
        });
        assert_eq!(err.to_string(), "classification error: API error 500: internal");
    }

    #[test]
    fn config_error_conversion() {
        let err: EngineError = ConfigError::NoHomeDirectory.into();
        assert!(matches!(err, EngineError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: failed to determine home directory"
        );
    }

    #[test]
    fn io_error_conversion_preserves_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn result_alias_works() {
        fn ready() -> Result<u32> {
            Ok(7)
        }
        assert_eq!(ready().unwrap(), 7);
    }
}
