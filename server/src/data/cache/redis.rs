//! Redis-compatible cache backend (Redis, Valkey, Dragonfly)
//!
//! ```text
//! redis://[user:password@]host:port[/db]
//! rediss://[user:password@]host:port[/db]
//! ```
//!
//! Sentinel URLs are refused; point the server at the primary directly.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use super::backend::CacheBackend;
use super::error::CacheError;

const POOL_MAX_SIZE: usize = 32;
const POOL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Build the connection pool and verify the server answers PING
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let display_url = redact_redis_url(redis_url);
        if is_sentinel_url(redis_url) {
            return Err(CacheError::Config(format!(
                "{display_url}: Sentinel URLs are not supported, use redis:// or rediss://"
            )));
        }

        let mut config = Config::from_url(redis_url);
        config.pool = Some(deadpool_redis::PoolConfig {
            max_size: POOL_MAX_SIZE,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(POOL_TIMEOUT),
                create: Some(POOL_TIMEOUT),
                recycle: Some(POOL_TIMEOUT),
            },
            ..Default::default()
        });
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(format!("{display_url}: {e}")))?;

        let cache = Self { pool };
        cache
            .health_check()
            .await
            .map_err(|e| CacheError::Connection(format!("{display_url}: {e}")))?;

        tracing::debug!(url = %display_url, backend = cache.backend_name(), "Redis cache connected");
        Ok(cache)
    }
}

fn is_sentinel_url(url: &str) -> bool {
    url.starts_with("redis+sentinel://") || url.starts_with("rediss+sentinel://")
}

/// Mask the password component of a connection URL for logging
fn redact_redis_url(url: &str) -> String {
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[scheme_end..at].find(':') {
        Some(colon) => {
            let user_end = scheme_end + colon + 1;
            format!("{}***{}", &url[..user_end], &url[at..])
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        match ttl {
            Some(ttl) => {
                // Millisecond expiry; a zero PSETEX is rejected by the server
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                let _: () = deadpool_redis::redis::cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_ms)
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.pool.get().await?;
        // -2 missing, -1 no expiry
        let ttl_ms: i64 = deadpool_redis::redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(u64::try_from(ttl_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
