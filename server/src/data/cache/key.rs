//! Versioned cache key builder

use crate::core::constants::CACHE_KEY_VERSION;

/// Builds every key the session layer writes
///
/// Keys carry a version prefix (e.g. "v1:") so a format change can orphan all
/// previously stored entries at once.
pub struct CacheKey;

impl CacheKey {
    /// Current refresh token for an identity (`provider` is the upper-case provider name)
    pub fn session(provider: &str, subject: &str) -> String {
        format!("{}:refresh:{}:{}", CACHE_KEY_VERSION, provider, subject)
    }

    /// Revocation marker, keyed by the SHA-256 hex digest of the token
    pub fn revoked(token_digest: &str) -> String {
        format!("{}:revoked:{}", CACHE_KEY_VERSION, token_digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        assert_eq!(
            CacheKey::session("LOCAL", "a@b.com"),
            "v1:refresh:LOCAL:a@b.com"
        );
        assert_ne!(
            CacheKey::session("KAKAO", "a@b.com"),
            CacheKey::session("NAVER", "a@b.com")
        );
    }

    #[test]
    fn test_revoked_key() {
        assert_eq!(CacheKey::revoked("abc123"), "v1:revoked:abc123");
    }
}
