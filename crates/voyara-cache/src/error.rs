//! Cache error types.

use thiserror::Error;
use voyara_core::VoyaraError;

/// Result type for store and cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Failures raised below the cache facade.
///
/// None of these reach business code through the facade: reads turn them
/// into misses and writes into `false`/`0`. They are surfaced directly only
/// by [`CacheStore`](crate::store::CacheStore) implementations and by the
/// raw methods of [`CacheInterface`](crate::CacheInterface).
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached, timed out, or is disabled.
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// A value could not be encoded or a stored value could not be decoded.
    #[error("Cache serialization failure: {0}")]
    SerializationFailure(String),

    /// A batched tagged write failed after it was submitted, so part of it
    /// may have been applied.
    #[error("Partial batch failure for key '{key}': {message}")]
    PartialBatchFailure { key: String, message: String },
}

impl CacheError {
    /// Creates a store-unavailable error.
    #[must_use]
    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Returns a machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::SerializationFailure(_) => "serialization_failure",
            Self::PartialBatchFailure { .. } => "partial_batch_failure",
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::StoreUnavailable(format!("Failed to get Redis connection: {}", err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailure(err.to_string())
    }
}

impl From<CacheError> for VoyaraError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::SerializationFailure(message) => Self::Serialization(message),
            other => Self::Cache(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CacheError::unavailable("down").kind(), "store_unavailable");
        assert_eq!(
            CacheError::SerializationFailure("bad".to_string()).kind(),
            "serialization_failure"
        );
        assert_eq!(
            CacheError::PartialBatchFailure {
                key: "k".to_string(),
                message: "m".to_string()
            }
            .kind(),
            "partial_batch_failure"
        );
    }

    #[test]
    fn test_json_error_is_serialization_failure() {
        let err = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(matches!(CacheError::from(err), CacheError::SerializationFailure(_)));
    }

    #[test]
    fn test_into_voyara_error() {
        let err: VoyaraError = CacheError::unavailable("connection refused").into();
        assert_eq!(err.error_code(), "CACHE_ERROR");
        assert!(err.to_string().contains("connection refused"));

        let err: VoyaraError = CacheError::SerializationFailure("eof".to_string()).into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
