//! Key-value cache with pluggable backends
//!
//! - In-memory (default) - moka
//! - Redis-compatible - deadpool-redis
//!
//! Session records and revocation markers are the only things stored here.

mod backend;
mod error;
mod key;
mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::CacheKey;

use memory::InMemoryCache;

use crate::core::config::{CacheBackendType, CacheConfig};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Typed access to the configured cache backend
///
/// Values are encoded with MessagePack.
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!("Initializing in-memory cache");
                Arc::new(InMemoryCache::new())
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                Arc::new(redis::RedisCache::new(url).await?)
            }
        };

        Ok(Self { backend })
    }

    /// Wrap an existing backend
    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(bytes) => rmp_serde::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.backend.set(key, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.delete(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.exists(key).await
    }

    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.backend.ttl(key).await
    }

    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.backend.health_check().await
    }

    /// Periodically ping the backend until shutdown, logging failures
    pub fn start_health_check_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Cache health check task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = cache.health_check().await {
                            tracing::warn!(backend = cache.backend_name(), error = %e, "Cache health check failed");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) fn test_cache() -> Arc<CacheService> {
    Arc::new(CacheService::with_backend(Arc::new(InMemoryCache::new())))
}

/// A cache whose backend refuses every operation
#[cfg(test)]
pub(crate) fn unreachable_cache() -> Arc<CacheService> {
    struct Unreachable;

    fn refused() -> CacheError {
        CacheError::Connection("connection refused".to_string())
    }

    #[async_trait::async_trait]
    impl CacheBackend for Unreachable {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(refused())
        }
        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(refused())
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(refused())
        }
        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(refused())
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Err(refused())
        }
        async fn health_check(&self) -> Result<(), CacheError> {
            Err(refused())
        }
        fn backend_name(&self) -> &'static str {
            "unreachable"
        }
    }

    Arc::new(CacheService::with_backend(Arc::new(Unreachable)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shutdown::ShutdownService;

    #[tokio::test]
    async fn test_typed_get_set() {
        let service = test_cache();

        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct Record {
            token: String,
            issued_at: i64,
        }

        let record = Record {
            token: "abc".to_string(),
            issued_at: 1_700_000_000,
        };

        service.set("record:1", &record, None).await.unwrap();
        let fetched: Option<Record> = service.get("record:1").await.unwrap();
        assert_eq!(fetched, Some(record));
        assert_eq!(service.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_get_wrong_type_is_serialization_error() {
        let service = test_cache();
        service.set("k", &"a string", None).await.unwrap();

        let result: Result<Option<Vec<u64>>, _> = service.get("k").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_new_memory_backend() {
        let config = CacheConfig {
            backend: CacheBackendType::Memory,
            redis_url: None,
        };
        let service = CacheService::new(&config).await.unwrap();
        assert!(service.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_new_redis_requires_url() {
        let config = CacheConfig {
            backend: CacheBackendType::Redis,
            redis_url: None,
        };
        assert!(matches!(
            CacheService::new(&config).await,
            Err(CacheError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check_task_stops_on_shutdown() {
        let shutdown = ShutdownService::new();
        let handle = test_cache().start_health_check_task(shutdown.subscribe());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
