//! Redis-backed store.

use super::{CacheStore, ExpireMode, TaggedWrite};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use voyara_config::RedisConfig;

/// Keys requested per `SCAN` iteration.
const SCAN_BATCH: usize = 200;

/// First server release accepting `EXPIRE key ttl NX|GT`.
const EXPIRE_FLAGS_SINCE: (u32, u32) = (7, 0);

/// `EXPIRE key ttl [NX|GT]` for servers that predate the flags.
/// Returns 1 when the expiry was updated, like `EXPIRE`.
const EXPIRE_IF_SCRIPT: &str = r"
local ttl = redis.call('TTL', KEYS[1])
if ttl == -2 then return 0 end
local mode = ARGV[2]
if mode == 'NX' and ttl ~= -1 then return 0 end
if mode == 'GT' and (ttl == -1 or ttl >= tonumber(ARGV[1])) then return 0 end
return redis.call('EXPIRE', KEYS[1], ARGV[1])
";

/// Create a Redis connection pool and check it with a `PING`.
pub async fn create_pool(config: &RedisConfig) -> CacheResult<Pool> {
    info!("Creating Redis connection pool for the cache...");

    let pool = Config::from_url(&config.url)
        .builder()
        .map_err(|e| CacheError::unavailable(format!("Invalid Redis config: {}", e)))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| CacheError::unavailable(format!("Failed to create pool: {}", e)))?;

    let ping = async {
        let mut conn = pool.get().await?;
        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await?;
        Ok::<_, CacheError>(())
    };

    tokio::time::timeout(config.connect_timeout(), ping)
        .await
        .map_err(|_| {
            CacheError::unavailable(format!(
                "Redis did not answer PING within {}s",
                config.connect_timeout_secs
            ))
        })??;

    info!("Redis connection pool created successfully");

    Ok(pool)
}

/// Store adapter over a shared Redis instance.
///
/// A store built with [`RedisStore::disabled`] holds no pool; the facade
/// never calls it and any direct call fails with `StoreUnavailable`.
#[derive(Clone)]
pub struct RedisStore {
    pool: Option<Arc<Pool>>,
    op_timeout: Duration,
    /// Whether the server takes `NX`/`GT` on `EXPIRE`; emulated with
    /// [`EXPIRE_IF_SCRIPT`] otherwise.
    expire_flags: bool,
}

impl RedisStore {
    /// Create a store over an existing pool of Redis 7 or later servers.
    #[must_use]
    pub fn new(pool: Arc<Pool>, op_timeout: Duration) -> Self {
        Self {
            pool: Some(pool),
            op_timeout,
            expire_flags: true,
        }
    }

    /// Create a pool from configuration and wrap it, adapting conditional
    /// expiry to the server version.
    pub async fn connect(config: &RedisConfig, op_timeout: Duration) -> CacheResult<Self> {
        let pool = create_pool(config).await?;
        let store = Self::new(Arc::new(pool), op_timeout);
        let expire_flags = store.detect_expire_flags().await;
        Ok(store.with_expire_flags(expire_flags))
    }

    /// Create a store that never connects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            pool: None,
            op_timeout: Duration::from_secs(1),
            expire_flags: true,
        }
    }

    /// Set whether `EXPIRE` flags are sent as-is or emulated with a script.
    #[must_use]
    pub fn with_expire_flags(mut self, supported: bool) -> Self {
        self.expire_flags = supported;
        self
    }

    #[must_use]
    pub fn supports_expire_flags(&self) -> bool {
        self.expire_flags
    }

    async fn detect_expire_flags(&self) -> bool {
        let info = self
            .timed("INFO", async {
                let mut conn = self.get_conn().await?;
                let info: String = deadpool_redis::redis::cmd("INFO")
                    .arg("server")
                    .query_async(&mut conn)
                    .await?;
                Ok::<_, CacheError>(info)
            })
            .await;

        match info.as_deref().ok().and_then(parse_redis_version) {
            Some(version) if version >= EXPIRE_FLAGS_SINCE => true,
            Some((major, minor)) => {
                warn!(
                    "Redis {}.{} does not support EXPIRE NX/GT, emulating tag TTL updates with a script",
                    major, minor
                );
                false
            }
            None => {
                warn!("Could not read the Redis server version, emulating tag TTL updates with a script");
                false
            }
        }
    }

    /// Appends one conditional expiry update to a pipeline.
    fn push_expire(&self, pipe: &mut deadpool_redis::redis::Pipeline, key: &str, ttl: u64, mode: ExpireMode) {
        match mode.flag() {
            Some(flag) if !self.expire_flags => {
                pipe.cmd("EVAL").arg(EXPIRE_IF_SCRIPT).arg(1).arg(key).arg(ttl).arg(flag);
            }
            Some(flag) => {
                pipe.cmd("EXPIRE").arg(key).arg(ttl).arg(flag);
            }
            None => {
                pipe.cmd("EXPIRE").arg(key).arg(ttl);
            }
        }
    }

    async fn get_conn(&self) -> CacheResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => Ok(pool.get().await?),
            None => Err(CacheError::unavailable("Cache is disabled")),
        }
    }

    /// Runs one store operation under the configured timeout.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>> + Send,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                CacheError::unavailable(format!(
                    "Redis {} timed out after {}ms",
                    op,
                    self.op_timeout.as_millis()
                ))
            })?
    }
}

/// `(major, minor)` from the `redis_version` field of an `INFO` reply.
fn parse_redis_version(info: &str) -> Option<(u32, u32)> {
    let version = info
        .lines()
        .find_map(|line| line.trim().strip_prefix("redis_version:"))?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor))
}

/// Escapes glob metacharacters so a literal prefix can be used with `MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

/// Failures before the server replied leave nothing applied; anything
/// after that may have applied part of the pipeline.
fn pipeline_error(key: &str, err: deadpool_redis::redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        CacheError::StoreUnavailable(err.to_string())
    } else {
        CacheError::PartialBatchFailure {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.timed("GET", async {
            let mut conn = self.get_conn().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, CacheError>(value)
        })
        .await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        self.timed("SET", async {
            let mut conn = self.get_conn().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1)).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<u64> {
        self.timed("DEL", async {
            let mut conn = self.get_conn().await?;
            let deleted: u64 = conn.del(key).await?;
            Ok::<_, CacheError>(deleted)
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.timed("DEL", async {
            let mut conn = self.get_conn().await?;
            let deleted: u64 = conn.del(keys).await?;
            Ok::<_, CacheError>(deleted)
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.timed("EXISTS", async {
            let mut conn = self.get_conn().await?;
            let exists: bool = conn.exists(key).await?;
            Ok::<_, CacheError>(exists)
        })
        .await
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        self.timed("SADD", async {
            let mut conn = self.get_conn().await?;
            conn.sadd::<_, _, ()>(set_key, member).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn set_expire(&self, key: &str, ttl_secs: u64, mode: ExpireMode) -> CacheResult<bool> {
        let mut pipe = deadpool_redis::redis::pipe();
        self.push_expire(&mut pipe, key, ttl_secs.max(1), mode);

        self.timed("EXPIRE", async {
            let mut conn = self.get_conn().await?;
            let (applied,): (i64,) = pipe.query_async(&mut conn).await?;
            Ok::<_, CacheError>(applied == 1)
        })
        .await
    }

    async fn members_of_set(&self, set_key: &str) -> CacheResult<Vec<String>> {
        self.timed("SMEMBERS", async {
            let mut conn = self.get_conn().await?;
            let members: Vec<String> = conn.smembers(set_key).await?;
            Ok::<_, CacheError>(members)
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let pattern = escape_glob(prefix);
        let mut conn = self.timed("SCAN", self.get_conn()).await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch) = self
                .timed("SCAN", async {
                    let reply: (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await?;
                    Ok::<_, CacheError>(reply)
                })
                .await?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();

        debug!("Scanned {} keys under prefix '{}'", keys.len(), prefix);
        Ok(keys)
    }

    async fn write_tagged(&self, write: &TaggedWrite<'_>) -> CacheResult<()> {
        let ttl = write.ttl_secs.max(1);
        let mut pipe = deadpool_redis::redis::pipe();

        pipe.cmd("SET").arg(write.key).arg(write.value).arg("EX").arg(ttl).ignore();
        for set_key in write.tag_sets {
            pipe.cmd("SADD").arg(set_key).arg(write.key).ignore();
            for mode in ExpireMode::for_policy(write.policy) {
                self.push_expire(&mut pipe, set_key, ttl, *mode);
                pipe.ignore();
            }
        }

        self.timed("pipeline", async {
            let mut conn = self.get_conn().await?;
            pipe.query_async::<()>(&mut conn)
                .await
                .map_err(|e| pipeline_error(write.key, e))
        })
        .await?;

        debug!(
            "Cached key '{}' with TTL {}s under {} tag(s)",
            write.key,
            ttl,
            write.tag_sets.len()
        );
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.timed("PING", async {
            let mut conn = self.get_conn().await?;
            deadpool_redis::redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await?;
            Ok::<_, CacheError>(())
        })
        .await
    }
}
