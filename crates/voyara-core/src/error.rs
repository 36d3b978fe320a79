//! Unified error types for the application layers.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for Voyara.
///
/// Cache failures are normally absorbed inside the cache facade; the
/// [`VoyaraError::Cache`] variant exists for the places that surface them on
/// purpose, such as administrative commands and start-up health checks.
#[derive(Error, Debug)]
pub enum VoyaraError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Redis/Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoyaraError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for VoyaraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            VoyaraError::Configuration("bad".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(VoyaraError::Cache("down".to_string()).error_code(), "CACHE_ERROR");
        assert_eq!(VoyaraError::Internal("oops".to_string()).error_code(), "INTERNAL_ERROR");
        assert_eq!(
            VoyaraError::from(anyhow::anyhow!("wrapped")).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: VoyaraError = std::io::Error::new(std::io::ErrorKind::NotFound, "warm-up file").into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.to_string().contains("warm-up file"));
    }

    #[test]
    fn test_json_error_conversion() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: VoyaraError = err.into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
