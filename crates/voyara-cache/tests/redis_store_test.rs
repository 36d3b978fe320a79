//! Integration tests for RedisStore and the cache service over Redis.
//!
//! These tests run against a real Redis server using testcontainers.
//! Requires Docker; run with `--ignored`.

mod common;

use common::TestRedis;
use std::sync::Arc;
use voyara_cache::store::{CacheStore, ExpireMode, TaggedWrite};
use voyara_cache::{CacheExt, CacheInterface, CacheOptions, CacheService, CacheTag, TagTtlPolicy};
use voyara_config::{CacheBackend, CacheConfig};

async fn ttl_of(store: &TestRedis, key: &str) -> i64 {
    let client = redis::Client::open(store.config().url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("TTL").arg(key).query_async(&mut conn).await.unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_delete() {
    let redis = TestRedis::new().await;
    let store = redis.store().await;

    store.set_with_ttl("k", "\"v\"", 60).await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("\"v\""));
    assert!(store.exists("k").await.unwrap());

    assert_eq!(store.delete("k").await.unwrap(), 1);
    assert_eq!(store.delete("k").await.unwrap(), 0);
    assert_eq!(store.get("k").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_expire_modes() {
    let redis = TestRedis::new().await;
    let store = redis.store().await;

    store.add_to_set("s", "a").await.unwrap();
    assert!(store.set_expire("s", 600, ExpireMode::IfUnset).await.unwrap());
    assert!(!store.set_expire("s", 900, ExpireMode::IfUnset).await.unwrap());
    assert!(!store.set_expire("s", 60, ExpireMode::IfGreater).await.unwrap());
    assert!(store.set_expire("s", 900, ExpireMode::IfGreater).await.unwrap());
    assert!(store.set_expire("s", 30, ExpireMode::Always).await.unwrap());
    assert!(ttl_of(&redis, "s").await <= 30);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_write_tagged_pipeline() {
    let redis = TestRedis::new().await;
    let store = redis.store().await;
    let tag_sets = vec!["t:a".to_string(), "t:b".to_string()];

    store
        .write_tagged(&TaggedWrite {
            key: "k",
            value: "1",
            ttl_secs: 120,
            tag_sets: &tag_sets,
            policy: TagTtlPolicy::Extend,
        })
        .await
        .unwrap();

    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
    for set_key in &tag_sets {
        assert_eq!(store.members_of_set(set_key).await.unwrap(), vec!["k".to_string()]);
        let ttl = ttl_of(&redis, set_key).await;
        assert!(ttl > 100 && ttl <= 120, "unexpected TTL {}", ttl);
    }
}

async fn extend_tag_ttl(store: &dyn CacheStore) {
    let tag_sets = vec!["t".to_string()];
    for (key, ttl) in [("long", 600), ("short", 60)] {
        store
            .write_tagged(&TaggedWrite {
                key,
                value: "1",
                ttl_secs: ttl,
                tag_sets: &tag_sets,
                policy: TagTtlPolicy::Extend,
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_detects_expire_flag_support() {
    let redis = TestRedis::new().await;
    assert!(redis.store().await.supports_expire_flags());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_scripted_expire_on_modern_server() {
    let redis = TestRedis::new().await;
    let store = (*redis.store().await).clone().with_expire_flags(false);

    store.add_to_set("s", "a").await.unwrap();
    assert!(store.set_expire("s", 600, ExpireMode::IfUnset).await.unwrap());
    assert!(!store.set_expire("s", 900, ExpireMode::IfUnset).await.unwrap());
    assert!(!store.set_expire("s", 60, ExpireMode::IfGreater).await.unwrap());
    assert!(store.set_expire("s", 900, ExpireMode::IfGreater).await.unwrap());
    assert!(!store.set_expire("missing", 60, ExpireMode::IfUnset).await.unwrap());

    extend_tag_ttl(&store).await;
    let ttl = ttl_of(&redis, "t").await;
    assert!(ttl > 500 && ttl <= 600, "unexpected TTL {}", ttl);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_extend_policy_on_redis_6() {
    let redis = TestRedis::with_tag("6.2").await;
    let store = redis.store().await;
    assert!(!store.supports_expire_flags());

    extend_tag_ttl(store.as_ref()).await;
    let ttl = ttl_of(&redis, "t").await;
    assert!(ttl > 500 && ttl <= 600, "unexpected TTL {}", ttl);

    let cache = CacheService::new(store).with_namespace("it");
    assert!(cache.set("k", &1u8, CacheOptions::new().tag(CacheTag::Featured)).await);
    assert_eq!(cache.invalidate_by_tags(&[CacheTag::Featured]).await, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_scan_prefix_is_literal() {
    let redis = TestRedis::new().await;
    let store = redis.store().await;

    for i in 0..450 {
        store.set_with_ttl(&format!("ns:key:{}", i), "1", 60).await.unwrap();
    }
    store.set_with_ttl("ns*:other", "1", 60).await.unwrap();
    store.set_with_ttl("other:key", "1", 60).await.unwrap();

    let keys = store.scan_prefix("ns:").await.unwrap();
    assert_eq!(keys.len(), 450);
    assert!(keys.iter().all(|k| k.starts_with("ns:")));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_service_over_redis() {
    let redis = TestRedis::new().await;
    let cache = CacheService::new(redis.store().await).with_namespace("it");

    let options = CacheOptions::new().ttl_secs(60).tag(CacheTag::Destinations);
    assert!(cache.set("destinations:id:42", &serde_json::json!({"name": "Lagos"}), options).await);
    assert!(cache.set("experiences:all", &vec![1, 2, 3], CacheOptions::new().tag(CacheTag::Experiences)).await);

    assert_eq!(cache.invalidate_by_tags(&[CacheTag::Destinations]).await, 1);
    assert_eq!(cache.get::<serde_json::Value>("destinations:id:42").await, None);
    assert_eq!(cache.get::<Vec<u32>>("experiences:all").await, Some(vec![1, 2, 3]));

    assert!(cache.health_check().await);
    assert!(cache.clear_all().await);
    assert!(!cache.exists("experiences:all").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_from_config_connects() {
    let redis = TestRedis::new().await;
    // Wait for the server before building from configuration.
    let _ = redis.store().await;

    let cache_config = CacheConfig {
        backend: CacheBackend::Redis,
        ..CacheConfig::default()
    };
    let cache = Arc::new(CacheService::from_config(&cache_config, redis.config()).await);

    assert!(cache.is_enabled());
    assert_eq!(cache.backend(), "redis");
    assert!(cache.health_check().await);
}
