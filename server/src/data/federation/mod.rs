//! External identity federation (KAKAO, NAVER)
//!
//! Exchanges an authorization code issued by a provider for a verified profile.

mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpFederation;

use super::identity::Provider;

#[derive(Error, Debug)]
pub enum FederationError {
    #[error("Provider {0} is not configured")]
    NotConfigured(Provider),

    #[error("Provider {0} does not support federation")]
    Unsupported(Provider),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: Provider, message: String },

    #[error("{provider} returned an unusable profile: {message}")]
    InvalidProfile { provider: Provider, message: String },
}

/// Profile verified by an external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: Provider,
    /// Becomes the token subject
    pub email: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityFederation: Send + Sync {
    /// Exchange `code` (and the `state` echoed by the provider, when it uses one)
    async fn exchange(
        &self,
        provider: Provider,
        code: &str,
        state: Option<&str>,
    ) -> Result<FederatedIdentity, FederationError>;
}
