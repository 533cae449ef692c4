//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderValue, Method, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::types::ApiError;
use crate::core::config::{ServerConfig, is_all_interfaces};

/// Origins allowed to make credentialed cross-origin requests
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// The server's own origins plus the configured ones
    pub fn new(config: &ServerConfig) -> Self {
        let host = config.host.as_str();
        let port = config.port;

        // Loopback and wildcard binds are reached as localhost or 127.0.0.1
        let base_hosts: Vec<&str> =
            if is_all_interfaces(host) || host == "127.0.0.1" || host == "localhost" {
                vec!["localhost", "127.0.0.1"]
            } else {
                vec![host]
            };

        let mut origins = Vec::new();
        for h in &base_hosts {
            origins.push(format!("http://{}:{}", h, port));
            origins.push(format!("http://{}", h));
        }
        for origin in &config.allowed_origins {
            let origin = origin.trim_end_matches('/').to_string();
            if !origin.is_empty() && !origins.contains(&origin) {
                origins.push(origin);
            }
        }

        Self { origins }
    }

    #[cfg(test)]
    fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
        ])
        .allow_credentials(true)
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404]");
    ApiError::not_found("NOT_FOUND", format!("No route for {}", req.uri().path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(host: &str, allowed: &[&str]) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port: 8080,
            allowed_origins: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_loopback_origins() {
        let origins = AllowedOrigins::new(&server("127.0.0.1", &[]));
        assert!(origins.is_allowed("http://localhost:8080"));
        assert!(origins.is_allowed("http://127.0.0.1:8080"));
        assert!(!origins.is_allowed("http://evil.example:8080"));
    }

    #[test]
    fn test_configured_origins() {
        let origins = AllowedOrigins::new(&server(
            "app.logolab.io",
            &["https://www.logolab.io/", "https://www.logolab.io"],
        ));
        assert!(origins.is_allowed("http://app.logolab.io:8080"));
        assert!(origins.is_allowed("https://www.logolab.io"));
        assert!(!origins.is_allowed("http://localhost:8080"));
        assert_eq!(origins.as_header_values().len(), 3);
    }
}
