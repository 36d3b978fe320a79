//! Namespaced, tag-indexed cache service over a [`CacheStore`].

use crate::cache_interface::{CacheInterface, CacheOptions};
use crate::error::{CacheError, CacheResult};
use crate::metrics::{AtomicCacheMetrics, CacheMetrics};
use crate::single_flight::SingleFlight;
use crate::store::{CacheStore, MemoryStore, RedisStore, TaggedWrite};
use crate::tags::CacheTag;
use async_trait::async_trait;
use shaku::Component;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use voyara_config::{CacheBackend, CacheConfig, RedisConfig, TagTtlPolicy};

/// Default namespace prefixed to every key.
pub const DEFAULT_NAMESPACE: &str = "voyara:cache";

/// Default TTL for cached items (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Keys deleted per round-trip by [`CacheInterface::clear_all`].
const CLEAR_BATCH: usize = 500;

/// Cache service.
///
/// Every key and tag set is stored under `{namespace}:`. Store failures are
/// logged and absorbed: reads become misses, writes report `false` or `0`.
#[derive(Component)]
#[shaku(interface = CacheInterface)]
pub struct CacheService {
    /// Backing store.
    #[shaku(default = default_store())]
    store: Arc<dyn CacheStore>,
    /// Hit/miss counters.
    #[shaku(default = default_metrics())]
    metrics: Arc<dyn CacheMetrics>,
    #[shaku(default = DEFAULT_NAMESPACE.to_string())]
    namespace: String,
    /// TTL for writes that do not set one.
    #[shaku(default = DEFAULT_TTL)]
    default_ttl: Duration,
    #[shaku(default)]
    tag_ttl_policy: TagTtlPolicy,
    /// Route `get_or_set` through the in-flight registry.
    #[shaku(default)]
    single_flight: bool,
    #[shaku(default)]
    in_flight: SingleFlight,
}

fn default_store() -> Arc<dyn CacheStore> {
    Arc::new(RedisStore::disabled())
}

fn default_metrics() -> Arc<dyn CacheMetrics> {
    Arc::new(AtomicCacheMetrics::new())
}

impl CacheService {
    /// Create a cache service over a store, with default settings.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            metrics: default_metrics(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: DEFAULT_TTL,
            tag_ttl_policy: TagTtlPolicy::default(),
            single_flight: false,
            in_flight: SingleFlight::new(),
        }
    }

    /// Create a cache service backed by a process-local store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Create a no-op cache service (for when Redis is disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(RedisStore::disabled()))
    }

    /// Build the service selected by configuration.
    ///
    /// An unreachable Redis server degrades to a disabled cache.
    pub async fn from_config(cache: &CacheConfig, redis: &RedisConfig) -> Self {
        let store: Arc<dyn CacheStore> = match cache.backend {
            CacheBackend::Disabled => Arc::new(RedisStore::disabled()),
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::Redis if !redis.enabled => {
                warn!("Redis is disabled in configuration, caching is off");
                Arc::new(RedisStore::disabled())
            }
            CacheBackend::Redis => match RedisStore::connect(redis, cache.operation_timeout()).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "Could not connect to Redis, caching is off");
                    Arc::new(RedisStore::disabled())
                }
            },
        };

        let service = Self::new(store)
            .with_namespace(&cache.namespace)
            .with_default_ttl(cache.default_ttl())
            .with_tag_ttl_policy(cache.tag_ttl_policy)
            .with_single_flight(cache.single_flight);

        info!(
            backend = service.store.name(),
            enabled = service.is_enabled(),
            namespace = %service.namespace,
            "Cache service initialized"
        );
        service
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.trim_end_matches(':').to_string();
        self
    }

    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_tag_ttl_policy(mut self, policy: TagTtlPolicy) -> Self {
        self.tag_ttl_policy = policy;
        self
    }

    #[must_use]
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Use a shared or custom metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The parameters to register this service in a shaku module.
    #[must_use]
    pub fn into_parameters(self) -> CacheServiceParameters {
        CacheServiceParameters {
            store: self.store,
            metrics: self.metrics,
            namespace: self.namespace,
            default_ttl: self.default_ttl,
            tag_ttl_policy: self.tag_ttl_policy,
            single_flight: self.single_flight,
            in_flight: self.in_flight,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Name of the backing store.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// The namespaced store key for a logical key.
    #[must_use]
    pub fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// The store key of a tag's index set.
    #[must_use]
    pub fn tag_key(&self, tag: &CacheTag) -> String {
        format!("{}:tag:{}", self.namespace, tag)
    }

    fn ttl_secs(&self, options: &CacheOptions) -> u64 {
        options.ttl.unwrap_or(self.default_ttl).as_secs().max(1)
    }

    async fn invalidate_tag(&self, tag: &CacheTag) -> CacheResult<u64> {
        let set_key = self.tag_key(tag);
        let members = self.store.members_of_set(&set_key).await?;

        let removed = self.store.delete_many(&members).await?;
        self.store.delete(&set_key).await?;

        debug!("Invalidated tag '{}': {} of {} keys removed", tag, removed, members.len());
        Ok(removed)
    }

    async fn clear_namespace(&self) -> CacheResult<u64> {
        let keys = self.store.scan_prefix(&format!("{}:", self.namespace)).await?;

        let mut removed = 0;
        for batch in keys.chunks(CLEAR_BATCH) {
            removed += self.store.delete_many(batch).await?;
        }
        Ok(removed)
    }
}

/// Tags in first-seen order, duplicates removed.
fn unique_tags(tags: &[CacheTag]) -> Vec<&CacheTag> {
    let mut unique: Vec<&CacheTag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

#[async_trait]
impl CacheInterface for CacheService {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        self.store.get(&self.full_key(key)).await
    }

    async fn set_raw(&self, key: &str, value: &str, options: &CacheOptions) -> CacheResult<()> {
        if !self.is_enabled() {
            return Err(CacheError::unavailable("Cache is disabled"));
        }

        let full_key = self.full_key(key);
        let ttl_secs = self.ttl_secs(options);

        if options.tags.is_empty() {
            self.store.set_with_ttl(&full_key, value, ttl_secs).await?;
        } else {
            let mut tag_sets: Vec<String> = options.tags.iter().map(|t| self.tag_key(t)).collect();
            tag_sets.sort_unstable();
            tag_sets.dedup();

            self.store
                .write_tagged(&TaggedWrite {
                    key: &full_key,
                    value,
                    ttl_secs,
                    tag_sets: &tag_sets,
                    policy: self.tag_ttl_policy,
                })
                .await?;
        }

        debug!("Cached key '{}' with TTL {}s", key, ttl_secs);
        Ok(())
    }

    async fn delete(&self, key: &str) -> bool {
        self.metrics.record_deletes(1);
        if !self.is_enabled() {
            return false;
        }

        match self.store.delete(&self.full_key(key)).await {
            Ok(deleted) => {
                debug!("Deleted key '{}': {}", key, deleted > 0);
                deleted > 0
            }
            Err(e) => {
                warn!(key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    async fn delete_many(&self, keys: &[String]) -> u64 {
        if keys.is_empty() {
            return 0;
        }

        self.metrics.record_deletes(keys.len() as u64);
        if !self.is_enabled() {
            return 0;
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        match self.store.delete_many(&full_keys).await {
            Ok(deleted) => {
                debug!("Deleted {} of {} keys", deleted, keys.len());
                deleted
            }
            Err(e) => {
                warn!(count = keys.len(), error = %e, "Cache batch delete failed");
                0
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }

        match self.store.exists(&self.full_key(key)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key, error = %e, "Cache exists check failed");
                false
            }
        }
    }

    async fn invalidate_by_tags(&self, tags: &[CacheTag]) -> u64 {
        if !self.is_enabled() || tags.is_empty() {
            return 0;
        }

        let unique = unique_tags(tags);

        let mut total = 0;
        for tag in &unique {
            match self.invalidate_tag(tag).await {
                Ok(removed) => total += removed,
                Err(e) => warn!(tag = %tag, error = %e, "Tag invalidation failed"),
            }
        }

        self.metrics.record_deletes(total);
        info!("Invalidated {} cached entries for {} tag(s)", total, unique.len());
        total
    }

    async fn clear_all(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        match self.clear_namespace().await {
            Ok(removed) => {
                info!("Cleared {} keys under namespace '{}'", removed, self.namespace);
                true
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Cache clear failed");
                false
            }
        }
    }

    async fn health_check(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Cache health check failed");
                false
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    fn metrics(&self) -> &dyn CacheMetrics {
        self.metrics.as_ref()
    }

    fn in_flight(&self) -> &SingleFlight {
        &self.in_flight
    }

    fn coalesces_misses(&self) -> bool {
        self.single_flight
    }
}
