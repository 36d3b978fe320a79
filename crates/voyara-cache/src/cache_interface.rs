//! Cache interface trait and the typed operations built on it.

use crate::error::{CacheError, CacheResult};
use crate::metrics::{CacheMetrics, CacheStats};
use crate::single_flight::SingleFlight;
use crate::tags::CacheTag;
use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shaku::Interface;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Time to live; the service default applies when `None`.
    #[serde(default, rename = "ttl_secs", with = "ttl_secs")]
    pub ttl: Option<Duration>,
    /// Tags recorded in the tag index for later invalidation.
    #[serde(default)]
    pub tags: Vec<CacheTag>,
}

impl CacheOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn ttl_secs(self, secs: u64) -> Self {
        self.ttl(Duration::from_secs(secs))
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<CacheTag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CacheTag>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => serializer.serialize_some(&ttl.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

/// One entry for [`CacheExt::warm_up`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmUpEntry<T> {
    pub key: String,
    pub value: T,
    #[serde(flatten)]
    pub options: CacheOptions,
}

impl<T> WarmUpEntry<T> {
    pub fn new(key: impl Into<String>, value: T, options: CacheOptions) -> Self {
        Self {
            key: key.into(),
            value,
            options,
        }
    }
}

/// Outcome of a warm-up run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmUpReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Cache interface for storing and retrieving cached data.
///
/// Keys are logical (un-namespaced); implementations apply their namespace.
/// Uses JSON strings for type-erased storage to stay dyn-compatible; the
/// typed operations live in [`CacheExt`].
///
/// Apart from the `*_raw` methods, nothing here returns an error: failures
/// of the backing store degrade to "not cached".
#[async_trait]
pub trait CacheInterface: Interface + Send + Sync {
    /// Get a raw JSON value. Not counted in the hit/miss statistics.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a raw JSON value. Not counted in the write statistics.
    async fn set_raw(&self, key: &str, value: &str, options: &CacheOptions) -> CacheResult<()>;

    /// Delete a value. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> bool;

    /// Delete several values. Returns the number of keys removed.
    async fn delete_many(&self, keys: &[String]) -> u64;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> bool;

    /// Delete every entry carrying any of `tags`, and the tag indexes
    /// themselves. Returns the number of entries removed.
    async fn invalidate_by_tags(&self, tags: &[CacheTag]) -> u64;

    /// Delete every key under this cache's namespace.
    async fn clear_all(&self) -> bool;

    /// Check the backing store answers.
    async fn health_check(&self) -> bool;

    /// Check if caching is enabled.
    fn is_enabled(&self) -> bool;

    /// Counters for this cache.
    fn metrics(&self) -> &dyn CacheMetrics;

    /// Registry used by [`CacheExt::get_or_set_single_flight`].
    fn in_flight(&self) -> &SingleFlight;

    /// Whether [`CacheExt::get_or_set`] coalesces concurrent misses.
    fn coalesces_misses(&self) -> bool {
        false
    }
}

/// Extension trait with typed methods for convenience.
///
/// This trait provides generic methods that work with any serializable type.
#[async_trait]
pub trait CacheExt: CacheInterface {
    /// Get a typed value. Store failures and undecodable values are misses.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match read_cached::<Self, T>(self, key).await {
            Some(value) => {
                self.metrics().record_hit();
                debug!("Cache hit for key '{}'", key);
                Some(value)
            }
            None => {
                self.metrics().record_miss();
                debug!("Cache miss for key '{}'", key);
                None
            }
        }
    }

    /// Set a typed value. Returns `false` if nothing was stored.
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, options: CacheOptions) -> bool {
        self.metrics().record_set();

        let result = match serde_json::to_string(value) {
            Ok(json) => self.set_raw(key, &json, &options).await,
            Err(e) => Err(CacheError::from(e)),
        };

        match result {
            Ok(()) => true,
            Err(e) if self.is_enabled() => {
                warn!(key, error = %e, kind = e.kind(), "Cache write failed");
                false
            }
            Err(_) => false,
        }
    }

    /// Get a value or compute and cache it if not present.
    ///
    /// `compute` errors are returned unchanged and nothing is cached. The
    /// computed value is returned whether or not caching it succeeded.
    /// Concurrent misses each run `compute` unless the cache
    /// [coalesces misses](CacheInterface::coalesces_misses).
    async fn get_or_set<T, E, F, Fut>(&self, key: &str, compute: F, options: CacheOptions) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if self.coalesces_misses() {
            return self.get_or_set_single_flight(key, compute, options).await;
        }

        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = compute().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Like [`get_or_set`](Self::get_or_set), but concurrent misses on the
    /// same key in this process run `compute` once; the others wait and
    /// read the stored result.
    async fn get_or_set_single_flight<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        options: CacheOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        // Each call counts as exactly one lookup, however many reads it takes.
        if let Some(cached) = read_cached::<Self, T>(self, key).await {
            self.metrics().record_hit();
            debug!("Cache hit for key '{}'", key);
            return Ok(cached);
        }

        let _flight = self.in_flight().acquire(key).await;

        // A caller that held the key before us may have filled it.
        if let Some(cached) = read_cached::<Self, T>(self, key).await {
            self.metrics().record_hit();
            debug!("Cache hit for key '{}' after waiting on in-flight compute", key);
            return Ok(cached);
        }

        self.metrics().record_miss();
        debug!("Cache miss for key '{}'", key);
        let value = compute().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Store many entries concurrently, tolerating individual failures.
    async fn warm_up<T: Serialize + Send + Sync>(&self, entries: Vec<WarmUpEntry<T>>) -> WarmUpReport {
        let total = entries.len();
        let results = join_all(
            entries
                .iter()
                .map(|entry| self.set(&entry.key, &entry.value, entry.options.clone())),
        )
        .await;

        let succeeded = results.into_iter().filter(|ok| *ok).count();
        let report = WarmUpReport {
            total,
            succeeded,
            failed: total - succeeded,
        };
        debug!(?report, "Cache warm-up finished");
        report
    }

    /// Current counters.
    fn get_stats(&self) -> CacheStats {
        self.metrics().snapshot()
    }

    /// Zero all counters.
    fn reset_stats(&self) {
        self.metrics().reset();
    }

    /// `hits / (hits + misses)`, `0.0` before any lookup.
    fn get_hit_rate(&self) -> f64 {
        self.metrics().hit_rate()
    }
}

// Blanket implementation for all CacheInterface implementations
impl<C: CacheInterface + ?Sized> CacheExt for C {}

/// Reads and decodes a value without touching the hit/miss counters.
/// Store failures and undecodable values read as absent.
async fn read_cached<C, T>(cache: &C, key: &str) -> Option<T>
where
    C: CacheInterface + ?Sized,
    T: DeserializeOwned,
{
    let raw = match cache.get_raw(key).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key, error = %e, "Cache read failed, treating as miss");
            None
        }
    };

    raw.and_then(|json| match serde_json::from_str::<T>(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Cached value could not be decoded, treating as miss");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Resource;

    #[test]
    fn test_options_builder() {
        let options = CacheOptions::new()
            .ttl_secs(60)
            .tag(Resource::Destinations)
            .tags([CacheTag::Featured, CacheTag::custom("homepage")]);
        assert_eq!(options.ttl, Some(Duration::from_secs(60)));
        assert_eq!(
            options.tags,
            vec![CacheTag::Destinations, CacheTag::Featured, CacheTag::custom("homepage")]
        );
    }

    #[test]
    fn test_warm_up_entry_deserialize() {
        let entry: WarmUpEntry<serde_json::Value> = serde_json::from_str(
            r#"{"key":"destinations:id:42","value":{"name":"Lagos"},"ttl_secs":60,"tags":["destinations"]}"#,
        )
        .unwrap();
        assert_eq!(entry.key, "destinations:id:42");
        assert_eq!(entry.options.ttl, Some(Duration::from_secs(60)));
        assert_eq!(entry.options.tags, vec![CacheTag::Destinations]);

        let bare: WarmUpEntry<u32> = serde_json::from_str(r#"{"key":"k","value":1}"#).unwrap();
        assert_eq!(bare.options, CacheOptions::default());
    }
}
