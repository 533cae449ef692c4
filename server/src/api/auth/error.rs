//! Authentication failure taxonomy

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::jwt::TokenError;
use crate::api::types::ApiError;
use crate::data::cache::CacheError;
use crate::data::{DirectoryError, FederationError};

/// Why a credential or session operation failed
///
/// The gate only logs these; the session endpoints turn them into responses.
#[derive(Error, Debug)]
pub enum AuthFailure {
    #[error("No token presented")]
    MissingToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Identity no longer exists")]
    UnknownIdentity,

    #[error("Refresh token has been superseded")]
    SupersededRefreshToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Federation failed: {0}")]
    Federation(#[from] FederationError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthFailure {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::InvalidSignature | TokenError::Malformed(_) => Self::MalformedToken,
            TokenError::Signing(msg) => Self::Internal(msg),
        }
    }
}

impl AuthFailure {
    /// Machine-readable code for client-side handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "TOKEN_MISSING",
            Self::MalformedToken => "TOKEN_INVALID",
            Self::ExpiredToken => "TOKEN_EXPIRED",
            Self::RevokedToken => "TOKEN_REVOKED",
            Self::UnknownIdentity => "UNKNOWN_IDENTITY",
            Self::SupersededRefreshToken => "TOKEN_SUPERSEDED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            Self::Federation(_) => "FEDERATION_FAILED",
            Self::Directory(_) => "DIRECTORY_ERROR",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        let code = failure.code();
        match failure {
            AuthFailure::MissingToken
            | AuthFailure::MalformedToken
            | AuthFailure::ExpiredToken
            | AuthFailure::RevokedToken
            | AuthFailure::UnknownIdentity
            | AuthFailure::SupersededRefreshToken
            | AuthFailure::InvalidCredentials => ApiError::unauthorized(code, failure.to_string()),
            AuthFailure::UnsupportedProvider(_) => ApiError::bad_request(code, failure.to_string()),
            AuthFailure::Federation(e) => match e {
                FederationError::NotConfigured(_) | FederationError::Unsupported(_) => {
                    ApiError::bad_request("UNSUPPORTED_PROVIDER", e.to_string())
                }
                FederationError::Rejected { .. } | FederationError::InvalidProfile { .. } => {
                    tracing::debug!(error = %e, "Federated login rejected");
                    ApiError::unauthorized(code, e.to_string())
                }
                FederationError::Http(_) => {
                    tracing::error!(error = %e, "Identity provider unreachable");
                    ApiError::service_unavailable("Identity provider unavailable")
                }
            },
            AuthFailure::Directory(e) => e.into(),
            AuthFailure::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Session store unavailable");
                ApiError::service_unavailable("Session store unavailable")
            }
            AuthFailure::Internal(msg) => {
                tracing::error!(error = %msg, "Authentication internal error");
                ApiError::internal("Authentication failed")
            }
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Provider;
    use axum::http::StatusCode;

    fn status(failure: AuthFailure) -> StatusCode {
        failure.into_response().status()
    }

    #[test]
    fn test_token_failures_are_unauthorized() {
        for failure in [
            AuthFailure::MissingToken,
            AuthFailure::MalformedToken,
            AuthFailure::ExpiredToken,
            AuthFailure::RevokedToken,
            AuthFailure::UnknownIdentity,
            AuthFailure::SupersededRefreshToken,
            AuthFailure::InvalidCredentials,
        ] {
            assert_eq!(status(failure), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_server_side_failures() {
        assert_eq!(
            status(AuthFailure::StoreUnavailable(CacheError::Connection(
                "refused".to_string()
            ))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(AuthFailure::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthFailure::UnsupportedProvider("google".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthFailure::Federation(FederationError::NotConfigured(
                Provider::Naver
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_token_error_mapping() {
        assert!(matches!(
            AuthFailure::from(TokenError::Expired),
            AuthFailure::ExpiredToken
        ));
        assert!(matches!(
            AuthFailure::from(TokenError::InvalidSignature),
            AuthFailure::MalformedToken
        ));
        assert_eq!(AuthFailure::SupersededRefreshToken.code(), "TOKEN_SUPERSEDED");
    }
}
