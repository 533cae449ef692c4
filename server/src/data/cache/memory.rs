//! In-process store backed by moka
//!
//! Each entry carries its own lifetime so session records and revocation markers
//! can expire exactly when the token they describe does. There is no capacity
//! bound: entries leave only by expiry or deletion, never by eviction.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::backend::CacheBackend;
use super::error::CacheError;

#[derive(Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    ttl: Option<Duration>,
    stored_at: Instant,
}

impl StoredValue {
    fn remaining(&self) -> Option<Duration> {
        let ttl = self.ttl?;
        ttl.checked_sub(self.stored_at.elapsed())
            .filter(|d| !d.is_zero())
    }
}

/// Expiry driven by the TTL stored alongside each value
struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }

    // Reads never extend a lifetime
    fn expire_after_read(
        &self,
        _key: &String,
        _value: &StoredValue,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        duration_until_expiry
    }
}

const INITIAL_CAPACITY: usize = 1024;

pub struct InMemoryCache {
    entries: Cache<String, StoredValue>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        let entries = Cache::builder()
            .initial_capacity(INITIAL_CAPACITY)
            .expire_after(PerEntryExpiry)
            .build();

        Self { entries }
    }

    /// Drop a lookup result whose lifetime has passed but which moka has not evicted yet
    fn live(value: Option<StoredValue>) -> Option<StoredValue> {
        value.filter(|v| v.ttl.is_none() || v.remaining().is_some())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(Self::live(self.entries.get(key).await).map(|v| v.bytes))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let stored = StoredValue {
            bytes: value,
            ttl,
            stored_at: Instant::now(),
        };
        self.entries.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(Self::live(self.entries.get(key).await).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        Ok(self
            .entries
            .get(key)
            .await
            .and_then(|value| value.remaining()))
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_replaces_previous_value() {
        let cache = InMemoryCache::new();

        cache.set("k", b"first".to_vec(), None).await.unwrap();
        cache.set("k", b"second".to_vec(), None).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let cache = InMemoryCache::new();

        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = InMemoryCache::new();

        cache
            .set("k", b"v".to_vec(), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.exists("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.entries.run_pending_tasks().await;

        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_reports_remaining_lifetime() {
        let cache = InMemoryCache::new();

        cache
            .set("short", b"v".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        cache.set("forever", b"v".to_vec(), None).await.unwrap();

        let remaining = cache.ttl("short").await.unwrap().unwrap().as_secs();
        assert!((58..=60).contains(&remaining));
        assert!(cache.ttl("forever").await.unwrap().is_none());
        assert!(cache.ttl("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_entry_is_evicted_for_space() {
        let cache = InMemoryCache::new();

        // Hot session records read repeatedly, then a burst of new writes
        for i in 0..10 {
            let key = format!("v1:refresh:LOCAL:hot{}", i);
            cache
                .set(&key, b"t".to_vec(), Some(Duration::from_secs(600)))
                .await
                .unwrap();
            for _ in 0..20 {
                cache.get(&key).await.unwrap();
            }
        }
        cache
            .set("v1:revoked:abc", b"1".to_vec(), Some(Duration::from_secs(600)))
            .await
            .unwrap();
        for i in 0..5_000 {
            cache
                .set(
                    &format!("v1:refresh:LOCAL:user{}", i),
                    b"t".to_vec(),
                    Some(Duration::from_secs(600)),
                )
                .await
                .unwrap();
        }
        cache.entries.run_pending_tasks().await;

        assert!(cache.exists("v1:revoked:abc").await.unwrap());
        assert_eq!(cache.entries.entry_count(), 5_011);
        for i in 0..5_000 {
            assert!(
                cache
                    .exists(&format!("v1:refresh:LOCAL:user{}", i))
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let cache = InMemoryCache::new();
        assert!(cache.health_check().await.is_ok());
        assert_eq!(cache.backend_name(), "memory");
    }
}
