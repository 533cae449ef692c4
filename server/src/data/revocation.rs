//! Access tokens invalidated before their natural expiry

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::cache::{CacheError, CacheKey, CacheService};
use crate::utils::crypto::sha256_hex;

/// Denylist of access tokens
///
/// Entries are keyed by the SHA-256 digest of the token and live no longer than
/// the token itself, so the list stays bounded.
#[derive(Debug, Clone)]
pub struct RevocationList {
    cache: Arc<CacheService>,
}

impl RevocationList {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Revoke `token` for `ttl`, which callers bound to the token's remaining lifetime.
    /// A zero TTL is a no-op: the token has already expired.
    pub async fn add(&self, token: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.cache
            .set(&CacheKey::revoked(&sha256_hex(token)), &true, Some(ttl))
            .await?;
        tracing::debug!(ttl_secs = ttl.as_secs(), "Access token revoked");
        Ok(())
    }

    /// Revoke `token` until `expires_at`, measured from `now`
    pub async fn add_until(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        self.add(token, remaining).await
    }

    pub async fn contains(&self, token: &str) -> Result<bool, CacheError> {
        self.cache
            .exists(&CacheKey::revoked(&sha256_hex(token)))
            .await
    }
}
