//! Cache hit/miss accounting.
//!
//! Counters live in an injectable [`CacheMetrics`] object owned by each cache
//! service. Increments are also forwarded to the `metrics` facade so an
//! installed exporter (Prometheus or otherwise) sees process-wide totals.

use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric names exported through the `metrics` facade.
pub mod names {
    /// Lookups that returned a value.
    pub const CACHE_HITS_TOTAL: &str = "voyara_cache_hits_total";
    /// Lookups that returned nothing, including absorbed failures.
    pub const CACHE_MISSES_TOTAL: &str = "voyara_cache_misses_total";
    /// Attempted writes.
    pub const CACHE_SETS_TOTAL: &str = "voyara_cache_sets_total";
    /// Attempted key deletions.
    pub const CACHE_DELETES_TOTAL: &str = "voyara_cache_deletes_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
    describe_counter!(names::CACHE_SETS_TOTAL, "Total number of attempted cache writes");
    describe_counter!(names::CACHE_DELETES_TOTAL, "Total number of attempted cache deletions");
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
}

impl CacheStats {
    #[must_use]
    pub fn new(hits: u64, misses: u64, sets: u64, deletes: u64) -> Self {
        Self {
            hits,
            misses,
            sets,
            deletes,
            hit_rate: hit_rate(hits, misses),
        }
    }

    /// Total lookups.
    #[must_use]
    pub const fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Computes `hits / (hits + misses)`, `0.0` when both are zero.
#[must_use]
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Counter sink used by the cache facade.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self);
    fn record_miss(&self);
    fn record_set(&self);
    fn record_deletes(&self, count: u64);
    fn snapshot(&self) -> CacheStats;
    fn reset(&self);

    fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate
    }
}

/// Lock-free counters.
#[derive(Debug, Default)]
pub struct AtomicCacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl AtomicCacheMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheMetrics for AtomicCacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_HITS_TOTAL).increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_MISSES_TOTAL).increment(1);
    }

    fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_SETS_TOTAL).increment(1);
    }

    fn record_deletes(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.deletes.fetch_add(count, Ordering::Relaxed);
        counter!(names::CACHE_DELETES_TOTAL).increment(count);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
        )
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }
}
