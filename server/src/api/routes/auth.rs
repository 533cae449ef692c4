//! Session endpoints: signup, login, social login, logout, refresh

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::users::types::IdentityDto;
use crate::api::auth::{
    AuthManager, CookieSet, CookieTransport, CurrentUser, SessionTokens, presented_access_token,
};
use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::core::constants::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::data::Role;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 72, message = "Password must be 1-72 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "Nickname must be 1-50 characters"))]
    pub nickname: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email cannot be empty"))]
    pub email: String,
    #[validate(length(min = 1, max = 72, message = "Password must be 1-72 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SocialLoginRequest {
    /// KAKAO or NAVER, case-insensitive
    #[validate(length(min = 1, message = "Provider cannot be empty"))]
    pub provider: String,
    /// Authorization code returned by the provider
    #[validate(length(min = 1, message = "Code cannot be empty"))]
    pub code: String,
    pub state: Option<String>,
}

/// Role of the session just issued or refreshed
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProtectedResponse {
    pub message: String,
    pub role: Role,
}

/// Shared by the session, user and admin routes
#[derive(Clone)]
pub struct SessionApiState {
    pub auth: Arc<AuthManager>,
    pub cookies: Arc<CookieTransport>,
}

/// Create session routes (mounted under `/api`)
pub fn routes(state: SessionApiState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/login/social", post(social_login))
        .route("/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/protected", get(protected))
        .with_state(state)
}

/// Clear every scope of both cookies, then issue the new pair
fn session_cookies(transport: &CookieTransport, tokens: &SessionTokens) -> CookieSet {
    CookieSet::new()
        .clear(transport, ACCESS_TOKEN_COOKIE)
        .clear(transport, REFRESH_TOKEN_COOKIE)
        .issue(
            transport,
            ACCESS_TOKEN_COOKIE,
            &tokens.access.value,
            tokens.access.ttl,
        )
        .issue(
            transport,
            REFRESH_TOKEN_COOKIE,
            &tokens.refresh.value,
            tokens.refresh.ttl,
        )
}

pub(crate) fn cleared_session_cookies(transport: &CookieTransport) -> CookieSet {
    CookieSet::new()
        .clear(transport, ACCESS_TOKEN_COOKIE)
        .clear(transport, REFRESH_TOKEN_COOKIE)
}

/// Register a local account
#[utoipa::path(
    post,
    path = "/api/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = IdentityDto),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<SessionApiState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> Result<(StatusCode, Json<IdentityDto>), ApiError> {
    let record = state
        .auth
        .signup(&request.email, &request.password, Some(&request.nickname))
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; access and refresh cookies set", body = SessionResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn login(
    State(state): State<SessionApiState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<(CookieSet, Json<SessionResponse>), ApiError> {
    let tokens = state.auth.login(&request.email, &request.password).await?;
    Ok((
        session_cookies(&state.cookies, &tokens),
        Json(SessionResponse { role: tokens.role }),
    ))
}

/// Log in through Kakao or Naver with an authorization code
#[utoipa::path(
    post,
    path = "/api/login/social",
    tag = "auth",
    request_body = SocialLoginRequest,
    responses(
        (status = 200, description = "Logged in; access and refresh cookies set", body = SessionResponse),
        (status = 400, description = "Unsupported or unconfigured provider"),
        (status = 401, description = "Provider rejected the code"),
        (status = 503, description = "Provider or session store unavailable")
    )
)]
pub async fn social_login(
    State(state): State<SessionApiState>,
    ValidatedJson(request): ValidatedJson<SocialLoginRequest>,
) -> Result<(CookieSet, Json<SessionResponse>), ApiError> {
    let tokens = state
        .auth
        .social_login(&request.provider, &request.code, request.state.as_deref())
        .await?;
    Ok((
        session_cookies(&state.cookies, &tokens),
        Json(SessionResponse { role: tokens.role }),
    ))
}

/// Log out: revoke the access token, end the session and clear cookies
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn logout(
    State(state): State<SessionApiState>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<(CookieSet, Json<MessageResponse>), ApiError> {
    let access = presented_access_token(&headers);
    let refresh = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

    let outcome = state
        .auth
        .logout(access.as_deref(), refresh.as_deref())
        .await?;
    tracing::debug!(
        access_revoked = outcome.access_revoked,
        session_removed = outcome.session_removed,
        "Logged out"
    );

    Ok((
        cleared_session_cookies(&state.cookies),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Issue a new access token from the refresh-token cookie
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access cookie set", body = SessionResponse),
        (status = 401, description = "Refresh token missing, invalid, expired or superseded", body = crate::api::types::ErrorBody),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn refresh(
    State(state): State<SessionApiState>,
    jar: CookieJar,
) -> Result<(CookieSet, Json<SessionResponse>), ApiError> {
    let token = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());
    let refreshed = state.auth.refresh(token.as_deref()).await?;

    let cookies = CookieSet::new()
        .clear(&state.cookies, ACCESS_TOKEN_COOKIE)
        .issue(
            &state.cookies,
            ACCESS_TOKEN_COOKIE,
            &refreshed.access.value,
            refreshed.access.ttl,
        );
    Ok((cookies, Json(SessionResponse { role: refreshed.role })))
}

/// Any authenticated caller
#[utoipa::path(
    get,
    path = "/api/protected",
    tag = "auth",
    responses(
        (status = 200, description = "Caller is authenticated", body = ProtectedResponse),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn protected(CurrentUser(principal): CurrentUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: format!("Hello, {}", principal.subject),
        role: principal.role,
    })
}
