//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{admin, auth, health, users};
use crate::api::types::ErrorBody;
use crate::data::{Provider, Role};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LogoLab API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Session and identity endpoints"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "Login, logout and token refresh"),
        (name = "users", description = "Caller's own account"),
        (name = "admin", description = "Identity management")
    ),
    paths(
        // Health
        health::health,
        // Auth
        auth::signup,
        auth::login,
        auth::social_login,
        auth::logout,
        auth::refresh,
        auth::protected,
        // Users
        users::get_current_user,
        users::update_current_user,
        users::delete_current_user,
        // Admin
        admin::list_identities,
        admin::create_identity,
        admin::get_identity,
        admin::update_identity,
        admin::delete_identity,
    ),
    components(schemas(
        ErrorBody,
        Role,
        Provider,
        health::HealthResponse,
        auth::SignupRequest,
        auth::LoginRequest,
        auth::SocialLoginRequest,
        auth::SessionResponse,
        auth::MessageResponse,
        auth::ProtectedResponse,
        users::types::IdentityDto,
        users::types::UpdateProfileRequest,
        admin::types::CreateIdentityRequest,
        admin::types::UpdateIdentityRequest,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>LogoLab API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_session_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/login",
            "/api/logout",
            "/api/auth/refresh",
            "/api/users/me",
            "/api/admin/user/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
