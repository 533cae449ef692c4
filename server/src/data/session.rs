//! Current refresh token per identity

use std::sync::Arc;
use std::time::Duration;

use super::cache::{CacheError, CacheKey, CacheService};
use super::identity::Provider;

/// Holds the single live refresh token for each (subject, provider)
///
/// A new token overwrites the previous one, so any earlier token presented
/// afterwards no longer matches and is treated as superseded.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cache: Arc<CacheService>,
}

impl SessionStore {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Store `refresh_token` as the current one, replacing any previous record
    pub async fn put(
        &self,
        subject: &str,
        provider: Provider,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = CacheKey::session(provider.as_str(), subject);
        self.cache.set(&key, &refresh_token, Some(ttl)).await?;
        tracing::debug!(subject = %subject, provider = %provider, ttl_secs = ttl.as_secs(), "Session stored");
        Ok(())
    }

    pub async fn get(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<Option<String>, CacheError> {
        self.cache
            .get(&CacheKey::session(provider.as_str(), subject))
            .await
    }

    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.cache.health_check().await
    }

    /// Returns `true` if a record existed
    pub async fn remove(&self, subject: &str, provider: Provider) -> Result<bool, CacheError> {
        let removed = self
            .cache
            .delete(&CacheKey::session(provider.as_str(), subject))
            .await?;
        tracing::debug!(subject = %subject, provider = %provider, removed, "Session removed");
        Ok(removed)
    }
}
