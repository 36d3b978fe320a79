//! Key-value store adapters.
//!
//! [`CacheStore`] is the only seam between the cache facade and the backing
//! store. Keys passed here are already namespaced.

mod memory_store;
mod redis_store;

pub use memory_store::{MemoryStore, SWEEP_INTERVAL};
pub use redis_store::{create_pool, RedisStore};

use crate::error::CacheResult;
use async_trait::async_trait;
use voyara_config::TagTtlPolicy;

/// Condition attached to an expiry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireMode {
    /// Always set the expiry.
    Always,
    /// Only when the key has no expiry yet (`NX`).
    IfUnset,
    /// Only when the new expiry is later than the current one (`GT`).
    IfGreater,
}

impl ExpireMode {
    /// The `EXPIRE` option flag, if any.
    #[must_use]
    pub const fn flag(self) -> Option<&'static str> {
        match self {
            Self::Always => None,
            Self::IfUnset => Some("NX"),
            Self::IfGreater => Some("GT"),
        }
    }

    /// The expiry updates applied to a tag set for the given policy.
    #[must_use]
    pub const fn for_policy(policy: TagTtlPolicy) -> &'static [ExpireMode] {
        match policy {
            TagTtlPolicy::Extend => &[Self::IfUnset, Self::IfGreater],
            TagTtlPolicy::LastWrite => &[Self::Always],
        }
    }
}

/// An entry write plus the tag index updates that must travel with it.
#[derive(Debug, Clone)]
pub struct TaggedWrite<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub ttl_secs: u64,
    /// Fully qualified tag set keys.
    pub tag_sets: &'a [String],
    pub policy: TagTtlPolicy,
}

/// Operations the cache facade needs from a backing store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// A disabled store is never contacted.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Writes a value that expires after `ttl_secs` (minimum 1).
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()>;

    /// Returns the number of keys removed.
    async fn delete(&self, key: &str) -> CacheResult<u64>;

    /// Returns the number of keys removed. An empty slice is a no-op.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()>;

    /// Returns whether the expiry was applied.
    async fn set_expire(&self, key: &str, ttl_secs: u64, mode: ExpireMode) -> CacheResult<bool>;

    async fn members_of_set(&self, set_key: &str) -> CacheResult<Vec<String>>;

    /// Every key starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Writes the entry and updates each tag set in a single round-trip.
    async fn write_tagged(&self, write: &TaggedWrite<'_>) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;
}
