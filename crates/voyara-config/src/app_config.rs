//! Application configuration structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use voyara_core::telemetry::{LogFormat, TelemetryConfig};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Application cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "voyara".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL.
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Timeout for establishing the pool and the start-up ping, in seconds.
    pub connect_timeout_secs: u64,
    /// Enable Redis (can be disabled for local development).
    pub enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connect_timeout_secs: 5,
            enabled: true,
        }
    }
}

impl RedisConfig {
    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Which store backs the application cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Shared Redis instance (production).
    #[default]
    Redis,
    /// Process-local store, for development and tests.
    Memory,
    /// Nothing is ever cached.
    Disabled,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// How the expiry of a tag index set follows the entries added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagTtlPolicy {
    /// The set's TTL only grows: it tracks the longest-lived member.
    #[default]
    Extend,
    /// The set's TTL is reset to the TTL of the entry added last.
    LastWrite,
}

/// Application cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backing store.
    pub backend: CacheBackend,
    /// Namespace prepended to every key and tag set.
    pub namespace: String,
    /// TTL applied when a write does not specify one, in seconds.
    pub default_ttl_secs: u64,
    /// Upper bound for a single store round-trip, in milliseconds.
    pub operation_timeout_ms: u64,
    /// Tag index expiry policy.
    pub tag_ttl_policy: TagTtlPolicy,
    /// Coalesce concurrent misses on the same key inside this process.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            namespace: "voyara:cache".to_string(),
            default_ttl_secs: 300, // 5 minutes
            operation_timeout_ms: 500,
            tag_ttl_policy: TagTtlPolicy::default(),
            single_flight: false,
        }
    }
}

impl CacheConfig {
    /// Returns the default TTL as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the per-operation timeout as a Duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: LogFormat,
    /// Write logs to the console.
    pub console_output: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            console_output: true,
        }
    }
}

impl ObservabilityConfig {
    /// Builds the tracing bootstrap settings for a named service.
    #[must_use]
    pub fn telemetry(&self, service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: service_name.to_string(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            console_output: self.console_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.namespace, "voyara:cache");
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.operation_timeout(), Duration::from_millis(500));
        assert_eq!(config.tag_ttl_policy, TagTtlPolicy::Extend);
        assert!(!config.single_flight);
    }

    #[test]
    fn test_partial_cache_section_keeps_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"backend":"memory","tag_ttl_policy":"last_write"}"#).unwrap();
        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.tag_ttl_policy, TagTtlPolicy::LastWrite);
        assert_eq!(config.default_ttl_secs, 300);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(CacheBackend::Redis.to_string(), "redis");
        assert_eq!(CacheBackend::Disabled.to_string(), "disabled");
    }

    #[test]
    fn test_observability_to_telemetry() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
            log_format: LogFormat::Json,
            console_output: true,
        };
        let telemetry = config.telemetry("voyara-cache");
        assert_eq!(telemetry.service_name, "voyara-cache");
        assert_eq!(telemetry.log_format, LogFormat::Json);
        assert_eq!(telemetry.default_directive(), "debug,voyara=debug");
    }
}
