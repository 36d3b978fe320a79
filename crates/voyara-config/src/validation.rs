//! Configuration validation module.
//!
//! Validates configuration values up front, failing fast on invalid
//! configuration rather than at runtime.

use crate::{AppConfig, CacheBackend};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Cache namespace is empty.
    EmptyNamespace,
    /// Cache namespace contains a glob metacharacter.
    InvalidNamespace { value: String },
    /// Pool size is zero or exceeds the maximum allowed.
    InvalidPoolSize { value: usize, maximum: usize },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout or TTL value must be positive.
    NonPositiveDuration { name: String },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyNamespace => write!(f, "Cache namespace cannot be empty"),
            Self::InvalidNamespace { value } => {
                write!(f, "Invalid cache namespace '{}': glob characters are not allowed", value)
            }
            Self::InvalidPoolSize { value, maximum } => {
                write!(f, "Invalid pool size {} (must be between 1 and {})", value, maximum)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::NonPositiveDuration { name } => {
                write!(f, "'{}' must be positive", name)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: usize = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_cache(config, &mut errors);
        Self::validate_redis(config, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cache(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
        let cache = &config.cache;

        if cache.namespace.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyNamespace);
        } else if cache.namespace.contains(&['*', '?', '[', ']'][..]) {
            errors.push(ConfigValidationError::InvalidNamespace {
                value: cache.namespace.clone(),
            });
        }

        if cache.default_ttl_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "cache.default_ttl_secs".to_string(),
            });
        }
        if cache.operation_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "cache.operation_timeout_ms".to_string(),
            });
        }
    }

    fn validate_redis(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
        let redis = &config.redis;
        if !redis.enabled || config.cache.backend != CacheBackend::Redis {
            return;
        }

        match Url::parse(&redis.url) {
            Ok(url) if url.scheme() == "redis" || url.scheme() == "rediss" => {}
            Ok(_) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            }),
            Err(e) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: e.to_string(),
            }),
        }

        if redis.pool_size == 0 || redis.pool_size > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::InvalidPoolSize {
                value: redis.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if redis.connect_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveDuration {
                name: "redis.connect_timeout_secs".to_string(),
            });
        }
    }

    fn validate_observability(
        config: &crate::ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_namespace_rules() {
        let mut config = AppConfig::default();
        config.cache.namespace = "  ".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors, vec![ConfigValidationError::EmptyNamespace]);

        config.cache.namespace = "voyara:*".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(errors[0], ConfigValidationError::InvalidNamespace { .. }));
    }

    #[test]
    fn test_zero_ttl_and_timeout_rejected() {
        let mut config = AppConfig::default();
        config.cache.default_ttl_secs = 0;
        config.cache.operation_timeout_ms = 0;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_redis_url_scheme() {
        let mut config = AppConfig::default();
        config.redis.url = "http://localhost:6379".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors[0].to_string().contains("redis://"));
    }

    #[test]
    fn test_redis_checks_skipped_for_memory_backend() {
        let mut config = AppConfig::default();
        config.cache.backend = CacheBackend::Memory;
        config.redis.url = "not a url".to_string();
        config.redis.pool_size = 0;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_disabled_redis_is_valid() {
        let mut config = AppConfig::default();
        config.redis.enabled = false;
        config.redis.url = String::new();
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(errors[0], ConfigValidationError::InvalidLogLevel { .. }));
    }
}
