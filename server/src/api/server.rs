//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::auth::{
    AuthManager, AuthenticationGate, AuthorizationPolicy, CookieTransport, authenticate, authorize,
};
use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::auth::SessionApiState;
use super::routes::{admin, auth, health, users};
use crate::core::CoreApp;
use crate::core::constants::{AUTH_BODY_LIMIT, DEFAULT_BODY_LIMIT};

/// Everything the router needs, assembled once at startup
#[derive(Clone)]
pub struct RouterState {
    pub auth: Arc<AuthManager>,
    pub cookies: Arc<CookieTransport>,
    pub gate: Arc<AuthenticationGate>,
    pub policy: Arc<AuthorizationPolicy>,
    pub allowed_origins: AllowedOrigins,
}

/// Build the full application router.
///
/// The gate and the policy wrap the whole tree so they see complete request
/// paths, including ones no route matches.
pub fn build_router(state: RouterState) -> Router {
    let session = SessionApiState {
        auth: state.auth,
        cookies: state.cookies,
    };

    let api = Router::new()
        .route("/health", get(health::health))
        .with_state(session.clone())
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui_html))
        .route("/docs/", get(swagger_ui_html))
        .merge(auth::routes(session.clone()).layer(DefaultBodyLimit::max(AUTH_BODY_LIMIT)))
        .nest("/users", users::routes(session.clone()))
        .nest("/admin", admin::routes(session));

    Router::new()
        .nest("/api", api)
        .fallback(middleware::handle_404)
        .layer(from_fn_with_state(state.policy, authorize))
        .layer(from_fn_with_state(state.gate, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(middleware::cors(&state.allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
}

pub struct ApiServer {
    app: CoreApp,
    state: RouterState,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let state = RouterState {
            auth: app.auth.clone(),
            cookies: app.cookies.clone(),
            gate: app.gate.clone(),
            policy: app.policy.clone(),
            allowed_origins: AllowedOrigins::new(&app.config.server),
        };
        Self { app, state }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app, state } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::debug!(%addr, "Listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::api::auth::{RouteTable, TokenCodec};
    use crate::core::config::{
        BootstrapAdmin, CookieConfig, CookieSameSite, FederationConfig, ServerConfig,
    };
    use crate::data::cache::{CacheService, test_cache, unreachable_cache};
    use crate::data::identity::{Provider, Role};
    use crate::data::{HttpFederation, InMemoryDirectory, RevocationList, SessionStore};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn test_state() -> RouterState {
        test_state_with(test_cache())
    }

    fn test_state_with(cache: Arc<CacheService>) -> RouterState {
        let codec = Arc::new(TokenCodec::new(
            SECRET,
            Duration::from_secs(1800),
            Duration::from_secs(86400),
        ));
        let revocations = RevocationList::new(cache.clone());
        let routes = Arc::new(RouteTable::default_routes());
        let auth = Arc::new(AuthManager::new(
            codec.clone(),
            SessionStore::new(cache),
            revocations.clone(),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(HttpFederation::new(FederationConfig::default()).unwrap()),
            4,
        ));
        RouterState {
            auth,
            cookies: Arc::new(CookieTransport::new(CookieConfig {
                domain: None,
                path: "/".to_string(),
                secure: true,
                same_site: CookieSameSite::None,
                legacy_domains: vec![],
                legacy_paths: vec!["/api".to_string()],
            })),
            gate: Arc::new(AuthenticationGate::new(codec, revocations, routes.clone())),
            policy: Arc::new(AuthorizationPolicy::new(routes)),
            allowed_origins: AllowedOrigins::new(&ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                allowed_origins: vec![],
            }),
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_cookies(method: &str, uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
        let cookie = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// Value of the cookie issued under `name` (deletion directives carry an empty value)
    fn issued(response: &Response, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        set_cookies(response).into_iter().find_map(|line| {
            let pair = line.split(';').next()?;
            let value = pair.strip_prefix(&prefix)?;
            (!value.is_empty()).then(|| value.to_string())
        })
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(router: &Router, email: &str, password: &str) -> (String, String) {
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/login",
                json!({"email": email, "password": password}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        (
            issued(&response, "access-token").unwrap(),
            issued(&response, "refresh-token").unwrap(),
        )
    }

    async fn signup(router: &Router, email: &str) {
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/signup",
                json!({"email": email, "password": "pw-12345", "nickname": "lee"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let router = build_router(test_state());
        signup(&router, "lee@logolab.io").await;

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/login",
                json!({"email": "lee@logolab.io", "password": "pw-12345"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // {host-only} x {"/", "/api"} deletions per cookie, then the two issued cookies
        let lines = set_cookies(&response);
        assert_eq!(lines.len(), 6);
        assert!(lines[..4].iter().all(|l| l.contains("Max-Age=0")));
        assert!(lines[4].starts_with("access-token=") && !lines[4].starts_with("access-token=;"));
        assert!(lines[5].starts_with("refresh-token="));
        assert!(lines[4].contains("HttpOnly") && lines[4].contains("Secure"));

        let access = issued(&response, "access-token").unwrap();
        let refresh = issued(&response, "refresh-token").unwrap();
        assert_eq!(json_body(response).await["role"], "USER");

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/protected",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["role"], "USER");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/protected")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/auth/refresh",
                &[("refresh-token", &refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(issued(&response, "access-token").is_some());
        assert!(issued(&response, "refresh-token").is_none());

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/logout",
                &[("access-token", &access), ("refresh-token", &refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let lines = set_cookies(&response);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.contains("Max-Age=0")));

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/protected",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/auth/refresh",
                &[("refresh-token", &refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A fresh login after logout starts a new, usable session
        let (new_access, new_refresh) = login(&router, "lee@logolab.io", "pw-12345").await;
        assert_ne!(new_access, access);
        assert_ne!(new_refresh, refresh);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/protected",
                &[("access-token", &new_access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/auth/refresh",
                &[("refresh-token", &new_refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_outage() {
        let router = build_router(test_state_with(unreachable_cache()));
        let codec = TokenCodec::new(SECRET, Duration::from_secs(1800), Duration::from_secs(86400));
        let access = codec
            .create_access_token("lee@logolab.io", Provider::Local, Role::User)
            .unwrap()
            .value;
        let refresh = codec
            .create_refresh_token("lee@logolab.io", Provider::Local)
            .unwrap()
            .value;

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/auth/refresh",
                &[("refresh-token", &refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "SERVICE_UNAVAILABLE");

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/logout",
                &[("access-token", &access), ("refresh-token", &refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // The gate cannot consult the revocation list, so the caller stays anonymous
        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/protected",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn test_garbage_access_token_is_anonymous() {
        let router = build_router(test_state());

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/protected",
                &[("access-token", "garbage")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn patch_me(access: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri("/api/users/me")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("access-token={}", access))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_own_profile() {
        let router = build_router(test_state());
        signup(&router, "lee@logolab.io").await;
        let (access, _) = login(&router, "lee@logolab.io", "pw-12345").await;

        let response = router
            .clone()
            .oneshot(patch_me(
                &access,
                json!({"nickname": "lee2", "avatar_url": "https://cdn.logolab.io/a.png"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["nickname"], "lee2");
        assert_eq!(body["avatar_url"], "https://cdn.logolab.io/a.png");

        // Restating the current address in another case is not a change
        let response = router
            .clone()
            .oneshot(patch_me(
                &access,
                json!({"email": "Lee@LogoLab.io", "nickname": "lee3"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["nickname"], "lee3");

        let response = router
            .clone()
            .oneshot(patch_me(
                &access,
                json!({"email": "other@logolab.io", "nickname": "lee4"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "EMAIL_IMMUTABLE");

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/users/me",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["nickname"], "lee3");
        assert_eq!(body["email"], "lee@logolab.io");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/users/me")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"nickname": "x"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_relogin_supersedes_refresh_token() {
        let router = build_router(test_state());
        signup(&router, "lee@logolab.io").await;

        let (first_access, first_refresh) = login(&router, "lee@logolab.io", "pw-12345").await;
        let (second_access, second_refresh) = login(&router, "lee@logolab.io", "pw-12345").await;
        assert_ne!(first_access, second_access);
        assert_ne!(first_refresh, second_refresh);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "POST",
                "/api/auth/refresh",
                &[("refresh-token", &first_refresh)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "TOKEN_SUPERSEDED");
    }

    #[tokio::test]
    async fn test_route_classes() {
        let router = build_router(test_state());

        let response = router
            .clone()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(Request::get("/api/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "AUTH_REQUIRED");

        // Unknown paths are not public
        let response = router
            .clone()
            .oneshot(Request::get("/api/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        signup(&router, "lee@logolab.io").await;
        let (access, _) = login(&router, "lee@logolab.io", "pw-12345").await;

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/nowhere",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/admin/users",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/users/me",
                &[("access-token", &access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["email"], "lee@logolab.io");
    }

    #[tokio::test]
    async fn test_admin_manages_identities() {
        let state = test_state();
        state
            .auth
            .ensure_admin(&BootstrapAdmin {
                email: "root@logolab.io".to_string(),
                password: "root-pw".to_string(),
            })
            .await
            .unwrap();
        let router = build_router(state);
        signup(&router, "lee@logolab.io").await;
        let (admin_access, _) = login(&router, "root@logolab.io", "root-pw").await;

        let response = router
            .clone()
            .oneshot(with_cookies(
                "GET",
                "/api/admin/users",
                &[("access-token", &admin_access)],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let users = json_body(response).await;
        let users = users.as_array().unwrap();
        assert_eq!(users.len(), 2);

        let lee_id = users
            .iter()
            .find(|u| u["email"] == "lee@logolab.io")
            .and_then(|u| u["id"].as_str())
            .unwrap()
            .to_string();

        let response = router
            .clone()
            .oneshot(with_cookies(
                "DELETE",
                &format!("/api/admin/user/{}", lee_id),
                &[("access-token", &admin_access)],
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/login",
                json!({"email": "lee@logolab.io", "password": "pw-12345"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
