//! Per-request identity resolution
//!
//! The gate turns a presented access token into a [`Principal`] on the request
//! extensions. It never rejects: any failure leaves the request anonymous and the
//! authorization layer decides what an anonymous caller may reach.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};

use super::error::AuthFailure;
use super::jwt::{TokenCodec, TokenKind};
use super::policy::{RouteClass, RouteTable};
use super::principal::Principal;
use crate::core::constants::ACCESS_TOKEN_COOKIE;
use crate::data::RevocationList;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// Access token from the bearer header, else from the access-token cookie
pub fn presented_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    codec: Arc<TokenCodec>,
    revocations: RevocationList,
    routes: Arc<RouteTable>,
}

impl AuthenticationGate {
    pub fn new(codec: Arc<TokenCodec>, revocations: RevocationList, routes: Arc<RouteTable>) -> Self {
        Self {
            codec,
            revocations,
            routes,
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, AuthFailure> {
        self.resolve_at(headers, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthFailure> {
        let token = presented_access_token(headers).ok_or(AuthFailure::MissingToken)?;
        let claims = self.codec.decode_at(&token, now)?;
        if claims.kind != Some(TokenKind::Access) {
            return Err(AuthFailure::MalformedToken);
        }
        let (Some(provider), Some(role)) = (claims.provider, claims.role) else {
            return Err(AuthFailure::MalformedToken);
        };
        if self.revocations.contains(&token).await? {
            return Err(AuthFailure::RevokedToken);
        }
        Ok(Principal {
            subject: claims.subject,
            provider,
            role,
        })
    }
}

/// Attach the caller's [`Principal`] when a usable access token is presented
pub async fn authenticate(
    State(gate): State<Arc<AuthenticationGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    if gate.routes.classify(request.method(), request.uri().path()) == RouteClass::Public {
        return next.run(request).await;
    }

    match gate.resolve(request.headers()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
        }
        Err(AuthFailure::MissingToken) => {}
        Err(e @ AuthFailure::StoreUnavailable(_)) => {
            tracing::warn!(error = %e, code = e.code(), "Revocation check failed, continuing anonymous");
        }
        Err(e) => {
            tracing::debug!(error = %e, code = e.code(), "Ignoring presented token");
        }
    }
    next.run(request).await
}
