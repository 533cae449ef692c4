//! Route classification and access decisions
//!
//! One table classifies every request. The authentication gate reads it to skip
//! public routes; the authorization layer reads it to allow or deny.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::principal::Principal;
use crate::api::types::ApiError;

/// Access class of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No identity needed
    Public,
    Authenticated,
    /// Authenticated; the handler restricts access to the caller's own records
    OwnerScoped,
    Admin,
}

#[derive(Debug, Clone)]
pub enum PathPattern {
    Exact(&'static str),
    /// Matches the prefix itself and anything below it on a segment boundary
    Prefix(&'static str),
}

impl PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == *p,
            Self::Prefix(p) => match path.strip_prefix(p) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || p.ends_with('/'),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    /// `None` matches any method
    pub method: Option<Method>,
    pub pattern: PathPattern,
    pub class: RouteClass,
}

impl RouteRule {
    pub fn new(method: Option<Method>, pattern: PathPattern, class: RouteClass) -> Self {
        Self {
            method,
            pattern,
            class,
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path)
    }
}

/// Ordered route rules; the first match wins
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Classification of the routes this server exposes
    pub fn default_routes() -> Self {
        use PathPattern::{Exact, Prefix};
        use RouteClass::*;

        Self::new(vec![
            RouteRule::new(Some(Method::GET), Exact("/api/health"), Public),
            RouteRule::new(Some(Method::GET), Exact("/api/openapi.json"), Public),
            RouteRule::new(Some(Method::GET), Prefix("/api/docs"), Public),
            RouteRule::new(Some(Method::POST), Exact("/api/signup"), Public),
            RouteRule::new(Some(Method::POST), Exact("/api/login"), Public),
            RouteRule::new(Some(Method::POST), Exact("/api/login/social"), Public),
            RouteRule::new(Some(Method::POST), Exact("/api/logout"), Public),
            RouteRule::new(Some(Method::POST), Exact("/api/auth/refresh"), Public),
            RouteRule::new(None, Exact("/api/protected"), Authenticated),
            RouteRule::new(None, Exact("/api/users/me"), OwnerScoped),
            RouteRule::new(None, Prefix("/api/admin"), Admin),
        ])
    }

    /// Unmatched routes are `Authenticated`
    pub fn classify(&self, method: &Method, path: &str) -> RouteClass {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.class)
            .unwrap_or(RouteClass::Authenticated)
    }
}

/// Allow/deny decision for a classified route and an optional principal
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    routes: Arc<RouteTable>,
}

impl AuthorizationPolicy {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    pub fn decide(&self, class: RouteClass, principal: Option<&Principal>) -> Result<(), ApiError> {
        match (class, principal) {
            (RouteClass::Public, _) => Ok(()),
            (_, None) => Err(ApiError::unauthorized(
                "AUTH_REQUIRED",
                "Authentication required",
            )),
            (RouteClass::Admin, Some(p)) if !p.is_admin() => Err(ApiError::forbidden(
                "FORBIDDEN",
                "Administrator role required",
            )),
            _ => Ok(()),
        }
    }

    pub fn check(&self, method: &Method, path: &str, principal: Option<&Principal>) -> Result<(), ApiError> {
        self.decide(self.routes.classify(method, path), principal)
    }
}

/// Reject requests the policy does not allow
///
/// Must run after [`super::gate::authenticate`] so the principal is present.
pub async fn authorize(
    State(policy): State<Arc<AuthorizationPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = policy.check(
        request.method(),
        request.uri().path(),
        request.extensions().get::<Principal>(),
    );
    match decision {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(method = %request.method(), path = %request.uri().path(), "Request denied");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::data::identity::{Provider, Role};

    fn principal(role: Role) -> Principal {
        Principal {
            subject: "a@b.com".to_string(),
            provider: Provider::Local,
            role,
        }
    }

    fn status(result: Result<(), ApiError>) -> Option<StatusCode> {
        result.err().map(|e| e.into_response().status())
    }

    #[test]
    fn test_classify_default_routes() {
        let table = RouteTable::default_routes();

        assert_eq!(table.classify(&Method::GET, "/api/health"), RouteClass::Public);
        assert_eq!(table.classify(&Method::POST, "/api/login"), RouteClass::Public);
        assert_eq!(
            table.classify(&Method::POST, "/api/auth/refresh"),
            RouteClass::Public
        );
        assert_eq!(
            table.classify(&Method::GET, "/api/users/me"),
            RouteClass::OwnerScoped
        );
        assert_eq!(
            table.classify(&Method::PATCH, "/api/admin/user/abc"),
            RouteClass::Admin
        );
        assert_eq!(
            table.classify(&Method::GET, "/api/protected"),
            RouteClass::Authenticated
        );
    }

    #[test]
    fn test_method_and_boundary_matching() {
        let table = RouteTable::default_routes();

        // Method filter: GET /api/login is not declared public
        assert_eq!(
            table.classify(&Method::GET, "/api/login"),
            RouteClass::Authenticated
        );
        assert_eq!(
            table.classify(&Method::GET, "/api/administrator"),
            RouteClass::Authenticated
        );
        assert_eq!(table.classify(&Method::GET, "/api/admin"), RouteClass::Admin);
        assert_eq!(
            table.classify(&Method::GET, "/api/logos/42"),
            RouteClass::Authenticated
        );
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new(vec![
            RouteRule::new(None, PathPattern::Exact("/api/admin/ping"), RouteClass::Public),
            RouteRule::new(None, PathPattern::Prefix("/api/admin"), RouteClass::Admin),
        ]);
        assert_eq!(
            table.classify(&Method::GET, "/api/admin/ping"),
            RouteClass::Public
        );
        assert_eq!(
            table.classify(&Method::GET, "/api/admin/users"),
            RouteClass::Admin
        );
    }

    #[test]
    fn test_decisions() {
        let policy = AuthorizationPolicy::new(Arc::new(RouteTable::default_routes()));
        let user = principal(Role::User);
        let admin = principal(Role::Admin);

        assert_eq!(status(policy.decide(RouteClass::Public, None)), None);
        assert_eq!(
            status(policy.decide(RouteClass::Authenticated, None)),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            status(policy.decide(RouteClass::OwnerScoped, Some(&user))),
            None
        );
        assert_eq!(
            status(policy.decide(RouteClass::Admin, None)),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            status(policy.decide(RouteClass::Admin, Some(&user))),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(status(policy.decide(RouteClass::Admin, Some(&admin))), None);
    }
}
