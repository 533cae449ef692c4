//! Credential cookies and multi-scope cleanup
//!
//! Cookies issued by earlier releases may live under other domains or paths.
//! A browser only drops a cookie when the deletion names the same scope, so
//! clearing emits one directive for every known (domain, path) combination.

use std::convert::Infallible;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::OffsetDateTime;

use crate::core::config::{CookieConfig, CookieSameSite};

/// Builds issuing and deletion directives for the configured cookie scopes
#[derive(Debug, Clone)]
pub struct CookieTransport {
    config: CookieConfig,
}

impl CookieTransport {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    /// One cookie at the canonical scope, expiring after `ttl`
    pub fn issue(&self, name: &str, value: &str, ttl: Duration) -> Cookie<'static> {
        let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let mut cookie = self.base(name, value, self.config.path.clone());
        if let Some(domain) = &self.config.domain {
            cookie.set_domain(domain.clone());
        }
        cookie.set_max_age(time::Duration::seconds(max_age));
        cookie
    }

    /// A deletion directive for every scope `name` may have been issued under
    pub fn clear_all_scope_variants(&self, name: &str) -> Vec<Cookie<'static>> {
        let mut directives = Vec::new();
        for domain in self.domain_variants() {
            for path in self.path_variants() {
                let mut cookie = self.base(name, "", path.to_string());
                if let Some(domain) = domain {
                    cookie.set_domain(domain.to_string());
                }
                cookie.set_max_age(time::Duration::ZERO);
                cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
                directives.push(cookie);
            }
        }
        directives
    }

    fn base(&self, name: &str, value: &str, path: String) -> Cookie<'static> {
        Cookie::build((name.to_string(), value.to_string()))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(match self.config.same_site {
                CookieSameSite::Strict => SameSite::Strict,
                CookieSameSite::Lax => SameSite::Lax,
                CookieSameSite::None => SameSite::None,
            })
            .path(path)
            .build()
    }

    /// Host-only first, then the canonical and legacy domains
    fn domain_variants(&self) -> Vec<Option<&str>> {
        let mut domains: Vec<Option<&str>> = vec![None];
        let configured = self
            .config
            .domain
            .iter()
            .chain(self.config.legacy_domains.iter());
        for domain in configured {
            let domain = Some(domain.as_str());
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        domains
    }

    fn path_variants(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = vec![self.config.path.as_str()];
        for path in &self.config.legacy_paths {
            if !paths.contains(&path.as_str()) {
                paths.push(path.as_str());
            }
        }
        paths
    }
}

/// Ordered `Set-Cookie` directives for one response
///
/// Deletions are always written before issued cookies, each as its own header.
#[derive(Debug, Default)]
pub struct CookieSet {
    deletions: Vec<Cookie<'static>>,
    issued: Vec<Cookie<'static>>,
}

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(mut self, transport: &CookieTransport, name: &str) -> Self {
        self.deletions
            .extend(transport.clear_all_scope_variants(name));
        self
    }

    pub fn issue(mut self, transport: &CookieTransport, name: &str, value: &str, ttl: Duration) -> Self {
        self.issued.push(transport.issue(name, value, ttl));
        self
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rendered directives in emission order
    pub fn directives(&self) -> Vec<String> {
        self.deletions
            .iter()
            .chain(self.issued.iter())
            .map(|c| c.to_string())
            .collect()
    }
}

impl IntoResponseParts for CookieSet {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for directive in self.directives() {
            match HeaderValue::from_str(&directive) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unencodable cookie"),
            }
        }
        Ok(res)
    }
}
