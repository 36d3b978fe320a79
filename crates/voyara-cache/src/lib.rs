//! # Voyara Cache
//!
//! Application-level cache for the Voyara travel platform: a namespaced,
//! TTL-based, tag-indexed cache in front of expensive read queries.
//!
//! Build keys with [`keys`], read through with [`CacheExt::get_or_set`] and
//! invalidate with [`CacheInterface::invalidate_by_tags`].

mod cache_interface;
mod cache_service;
pub mod di;
pub mod error;
pub mod keys;
pub mod metrics;
mod single_flight;
pub mod store;
pub mod tags;

pub use cache_interface::{CacheExt, CacheInterface, CacheOptions, WarmUpEntry, WarmUpReport};
pub use cache_service::{CacheService, CacheServiceParameters, DEFAULT_NAMESPACE, DEFAULT_TTL};
pub use di::{build_cache_module, CacheModule};
pub use error::{CacheError, CacheResult};
pub use keys::{KeyParams, Resource, ResourceKeys, SortOrder};
pub use metrics::{AtomicCacheMetrics, CacheMetrics, CacheStats};
pub use single_flight::{FlightGuard, SingleFlight};
pub use store::{CacheStore, MemoryStore, RedisStore};
pub use tags::CacheTag;
pub use voyara_config::{CacheBackend, TagTtlPolicy};
