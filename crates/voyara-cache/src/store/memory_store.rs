//! Process-local store for development and tests.
//!
//! Mirrors the subset of Redis semantics the facade relies on: string
//! values and sets share one keyspace, every key may carry an expiry, and
//! expired keys behave as absent. Expiry is checked lazily on access, and
//! writes sweep out every expired key at most once per [`SWEEP_INTERVAL`].

use super::{CacheStore, ExpireMode, TaggedWrite};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Minimum time between two sweeps of expired keys.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    /// Locked after `entries`, never before.
    swept_at: Mutex<Option<Instant>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of a key, `None` if absent or persistent.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a raw value without expiry, bypassing the facade.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: None,
            },
        );
    }

    /// Number of stored keys, expired ones not yet swept included.
    #[cfg(test)]
    fn stored_len(&self) -> usize {
        self.entries.lock().len()
    }

    fn sweep_expired(&self, entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        let mut swept_at = self.swept_at.lock();
        if swept_at.is_some_and(|at| now.duration_since(at) < SWEEP_INTERVAL) {
            return;
        }
        entries.retain(|_, entry| entry.is_live(now));
        *swept_at = Some(now);
    }

    fn deadline(ttl_secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(ttl_secs.max(1))
    }

    fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn wrong_type(key: &str) -> CacheError {
        CacheError::unavailable(format!(
            "WRONGTYPE operation against key '{}' holding the wrong kind of value",
            key
        ))
    }

    fn apply_expire(entry: &mut Entry, ttl_secs: u64, mode: ExpireMode) -> bool {
        let deadline = Self::deadline(ttl_secs);
        let apply = match mode {
            ExpireMode::Always => true,
            ExpireMode::IfUnset => entry.expires_at.is_none(),
            // A key without expiry counts as infinite TTL, so GT never applies.
            ExpireMode::IfGreater => entry.expires_at.is_some_and(|at| deadline > at),
        };
        if apply {
            entry.expires_at = Some(deadline);
        }
        apply
    }

    fn sadd(entries: &mut HashMap<String, Entry>, set_key: &str, member: &str) -> CacheResult<()> {
        match Self::live_entry(entries, set_key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.insert(member.to_string());
                Ok(())
            }
            Some(_) => Err(Self::wrong_type(set_key)),
            None => {
                entries.insert(
                    set_key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([member.to_string()])),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        self.sweep_expired(&mut entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Self::deadline(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<u64> {
        let mut entries = self.entries.lock();
        let live = Self::live_entry(&mut entries, key).is_some();
        entries.remove(key);
        Ok(u64::from(live))
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        let mut entries = self.entries.lock();
        let mut removed = 0;
        for key in keys {
            if Self::live_entry(&mut entries, key).is_some() {
                entries.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock();
        Ok(Self::live_entry(&mut entries, key).is_some())
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        self.sweep_expired(&mut entries);
        Self::sadd(&mut entries, set_key, member)
    }

    async fn set_expire(&self, key: &str, ttl_secs: u64, mode: ExpireMode) -> CacheResult<bool> {
        let mut entries = self.entries.lock();
        Ok(Self::live_entry(&mut entries, key).is_some_and(|entry| Self::apply_expire(entry, ttl_secs, mode)))
    }

    async fn members_of_set(&self, set_key: &str) -> CacheResult<Vec<String>> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, set_key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(Self::wrong_type(set_key)),
            None => Ok(Vec::new()),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn write_tagged(&self, write: &TaggedWrite<'_>) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        self.sweep_expired(&mut entries);
        entries.insert(
            write.key.to_string(),
            Entry {
                value: Value::Text(write.value.to_string()),
                expires_at: Some(Self::deadline(write.ttl_secs)),
            },
        );

        for set_key in write.tag_sets {
            Self::sadd(&mut entries, set_key, write.key).map_err(|e| CacheError::PartialBatchFailure {
                key: write.key.to_string(),
                message: e.to_string(),
            })?;
            if let Some(entry) = Self::live_entry(&mut entries, set_key) {
                for mode in super::ExpireMode::for_policy(write.policy) {
                    Self::apply_expire(entry, write.ttl_secs, *mode);
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}
