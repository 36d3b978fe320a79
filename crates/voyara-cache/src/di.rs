//! Dependency injection module using Shaku.
//!
//! Host processes build a [`CacheModule`] once at start-up and resolve
//! `Arc<dyn CacheInterface>` from it.

use crate::cache_interface::CacheInterface;
use crate::cache_service::CacheService;
use shaku::{module, HasComponent};
use std::sync::Arc;
use voyara_config::AppConfig;

module! {
    pub CacheModule {
        components = [CacheService],
        providers = [],
    }
}

/// Builds the cache module from configuration.
///
/// Never fails: an unreachable store yields a disabled cache.
pub async fn build_cache_module(config: &AppConfig) -> Arc<CacheModule> {
    let service = CacheService::from_config(&config.cache, &config.redis).await;
    Arc::new(module_with(service))
}

/// Wraps an already configured service in a module.
#[must_use]
pub fn module_with(service: CacheService) -> CacheModule {
    CacheModule::builder()
        .with_component_parameters::<CacheService>(service.into_parameters())
        .build()
}

/// Resolves the cache from a module.
#[must_use]
pub fn resolve_cache(module: &CacheModule) -> Arc<dyn CacheInterface> {
    module.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_interface::{CacheExt, CacheOptions};
    use voyara_config::CacheBackend;

    #[tokio::test]
    async fn test_resolve_from_module() {
        let mut config = AppConfig::default();
        config.cache.backend = CacheBackend::Memory;

        let module = build_cache_module(&config).await;
        let cache = resolve_cache(&module);

        assert!(cache.is_enabled());
        assert!(cache.set("k", &"v", CacheOptions::new()).await);
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_unparameterized_module_is_disabled() {
        let module = CacheModule::builder().build();
        let cache = resolve_cache(&module);

        assert!(!cache.is_enabled());
        assert!(!cache.set("k", &"v", CacheOptions::new()).await);
        assert_eq!(cache.get::<String>("k").await, None);
    }

    #[tokio::test]
    async fn test_module_resolves_singleton() {
        let module = module_with(CacheService::in_memory());
        let a = resolve_cache(&module);
        let b = resolve_cache(&module);

        a.get::<u32>("missing").await;
        assert_eq!(b.get_stats().misses, 1);
    }
}
