//! Principal extractors for handlers
//!
//! ```no_run
//! # use axum::Json;
//! # use logolab_server::api::auth::CurrentUser;
//! pub async fn whoami(CurrentUser(principal): CurrentUser) -> Json<String> {
//!     Json(principal.subject)
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::principal::Principal;
use crate::api::types::ApiError;

fn principal(parts: &Parts) -> Result<Principal, ApiError> {
    parts
        .extensions
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("AUTH_REQUIRED", "Authentication required"))
}

/// The authenticated caller; 401 when the request is anonymous
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal(parts).map(Self)
    }
}

/// An authenticated administrator; 403 for any other role
#[derive(Debug, Clone)]
pub struct Admin(pub Principal);

impl<S> FromRequestParts<S> for Admin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = principal(parts)?;
        if !principal.is_admin() {
            return Err(ApiError::forbidden(
                "FORBIDDEN",
                "Administrator role required",
            ));
        }
        Ok(Self(principal))
    }
}
