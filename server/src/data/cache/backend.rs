//! Storage backend trait for the key-value cache

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Key-value backend with per-entry expiry
///
/// Implemented by the in-memory store and the Redis-compatible store. Single-key
/// operations are atomic; the boolean results of `delete` and `exists` may be stale
/// under concurrent writers.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value, replacing any previous one. `None` never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Returns `true` if the key was present
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining lifetime, `None` for missing or non-expiring keys
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    async fn health_check(&self) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}
