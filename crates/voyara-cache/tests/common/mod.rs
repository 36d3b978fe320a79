//! Common test infrastructure for Redis integration tests.

use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::redis::{Redis, REDIS_PORT};
use voyara_cache::RedisStore;
use voyara_config::RedisConfig;

/// Redis testcontainer wrapper.
///
/// The container is stopped when this value is dropped.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    config: RedisConfig,
}

/// Server release the suite runs against by default.
pub const REDIS_TAG: &str = "7.2";

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        Self::with_tag(REDIS_TAG).await
    }

    /// Starts a fresh container of a specific `redis` image tag.
    pub async fn with_tag(tag: &str) -> Self {
        let container = Redis::default()
            .with_tag(tag)
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        let config = RedisConfig {
            url: format!("redis://127.0.0.1:{}", port),
            pool_size: 4,
            connect_timeout_secs: 5,
            enabled: true,
        };

        Self {
            _container: container,
            config,
        }
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Connects a store, retrying while the server finishes starting.
    pub async fn store(&self) -> Arc<RedisStore> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match RedisStore::connect(&self.config, Duration::from_secs(2)).await {
                Ok(store) => return Arc::new(store),
                Err(e) if attempts < 20 => {
                    eprintln!("Redis not ready (attempt {}): {}", attempts, e);
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => panic!("Failed to connect to Redis: {}", e),
            }
        }
    }
}
