//! Endpoints scoped to the caller's own identity

pub mod types;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};

use super::auth::{SessionApiState, cleared_session_cookies};
use crate::api::auth::{CookieSet, CurrentUser, presented_access_token};
use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::identity::IdentityUpdate;

use types::{IdentityDto, UpdateProfileRequest};

/// Build user routes (mounted under `/api/users`)
pub fn routes(state: SessionApiState) -> Router<()> {
    Router::new()
        .route(
            "/me",
            get(get_current_user)
                .patch(update_current_user)
                .delete(delete_current_user),
        )
        .with_state(state)
}

/// The caller's identity record
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller's identity", body = IdentityDto),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_current_user(
    State(state): State<SessionApiState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<IdentityDto>, ApiError> {
    let record = state
        .auth
        .directory()
        .find(&principal.subject, principal.provider)
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;
    Ok(Json(record.into()))
}

/// Update the caller's nickname or avatar; the email address is fixed
#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated identity", body = IdentityDto),
        (status = 400, description = "Validation failed or email change attempted"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_current_user(
    State(state): State<SessionApiState>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<IdentityDto>, ApiError> {
    let email_changed = request
        .email
        .as_deref()
        .is_some_and(|email| email.trim().to_lowercase() != principal.subject);
    if email_changed {
        return Err(ApiError::bad_request(
            "EMAIL_IMMUTABLE",
            "Email cannot be changed",
        ));
    }
    let record = state
        .auth
        .directory()
        .find(&principal.subject, principal.provider)
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;
    let record = state
        .auth
        .update_identity(
            &record.id,
            IdentityUpdate {
                nickname: request.nickname,
                avatar_url: request.avatar_url,
                role: None,
            },
        )
        .await?;
    tracing::debug!(id = %record.id, "Profile updated");
    Ok(Json(record.into()))
}

/// Delete the caller's account, end its session and clear cookies
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn delete_current_user(
    State(state): State<SessionApiState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
) -> Result<(StatusCode, CookieSet, ()), ApiError> {
    let access = presented_access_token(&headers);
    state
        .auth
        .delete_account(&principal, access.as_deref())
        .await?;
    Ok((
        StatusCode::NO_CONTENT,
        cleared_session_cookies(&state.cookies),
        (),
    ))
}
