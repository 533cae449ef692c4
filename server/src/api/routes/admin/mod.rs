//! Identity management for administrators

pub mod types;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::auth::SessionApiState;
use super::users::types::IdentityDto;
use crate::api::auth::Admin;
use crate::api::extractors::{IdPath, ValidatedJson};
use crate::api::types::ApiError;
use crate::data::identity::IdentityUpdate;

use types::{CreateIdentityRequest, UpdateIdentityRequest};

/// Build admin routes (mounted under `/api/admin`)
pub fn routes(state: SessionApiState) -> Router<()> {
    Router::new()
        .route("/users", get(list_identities))
        .route("/user", post(create_identity))
        .route(
            "/user/{id}",
            get(get_identity)
                .patch(update_identity)
                .delete(delete_identity),
        )
        .with_state(state)
}

/// List every identity, oldest first
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "All identities", body = Vec<IdentityDto>),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn list_identities(
    State(state): State<SessionApiState>,
    Admin(_admin): Admin,
) -> Result<Json<Vec<IdentityDto>>, ApiError> {
    let records = state.auth.directory().list().await?;
    Ok(Json(records.into_iter().map(IdentityDto::from).collect()))
}

/// Create a local identity with an explicit role
#[utoipa::path(
    post,
    path = "/api/admin/user",
    tag = "admin",
    request_body = CreateIdentityRequest,
    responses(
        (status = 201, description = "Identity created", body = IdentityDto),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_identity(
    State(state): State<SessionApiState>,
    Admin(admin): Admin,
    ValidatedJson(request): ValidatedJson<CreateIdentityRequest>,
) -> Result<(StatusCode, Json<IdentityDto>), ApiError> {
    let record = state
        .auth
        .create_local_identity(
            &request.email,
            &request.password,
            Some(&request.nickname),
            request.role,
        )
        .await?;
    tracing::info!(admin = %admin.subject, id = %record.id, "Identity created by admin");
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    get,
    path = "/api/admin/user/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Identity", body = IdentityDto),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_identity(
    State(state): State<SessionApiState>,
    Admin(_admin): Admin,
    IdPath(id): IdPath,
) -> Result<Json<IdentityDto>, ApiError> {
    let record = state
        .auth
        .directory()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;
    Ok(Json(record.into()))
}

/// Update nickname or role; a new role reaches tokens at the holder's next refresh
#[utoipa::path(
    patch,
    path = "/api/admin/user/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Identity id")),
    request_body = UpdateIdentityRequest,
    responses(
        (status = 200, description = "Updated identity", body = IdentityDto),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_identity(
    State(state): State<SessionApiState>,
    Admin(admin): Admin,
    IdPath(id): IdPath,
    ValidatedJson(request): ValidatedJson<UpdateIdentityRequest>,
) -> Result<Json<IdentityDto>, ApiError> {
    let record = state
        .auth
        .update_identity(
            &id,
            IdentityUpdate {
                nickname: request.nickname,
                role: request.role,
                ..Default::default()
            },
        )
        .await?;
    tracing::info!(admin = %admin.subject, id = %record.id, role = %record.role, "Identity updated by admin");
    Ok(Json(record.into()))
}

/// Delete an identity and end its session
#[utoipa::path(
    delete,
    path = "/api/admin/user/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Identity id")),
    responses(
        (status = 204, description = "Identity deleted"),
        (status = 400, description = "Administrators cannot delete themselves"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_identity(
    State(state): State<SessionApiState>,
    Admin(admin): Admin,
    IdPath(id): IdPath,
) -> Result<StatusCode, ApiError> {
    let own = state
        .auth
        .directory()
        .find(&admin.subject, admin.provider)
        .await?;
    if own.is_some_and(|record| record.id == id) {
        return Err(ApiError::bad_request(
            "CANNOT_DELETE_SELF",
            "Use DELETE /api/users/me to delete your own account",
        ));
    }
    let record = state.auth.delete_identity(&id).await?;
    tracing::info!(admin = %admin.subject, id = %record.id, provider = %record.provider, "Identity deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
