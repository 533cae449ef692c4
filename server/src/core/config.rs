use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_ACCESS_TTL_SECS, DEFAULT_ALLOWED_ORIGINS,
    DEFAULT_COOKIE_PATH, DEFAULT_HOST, DEFAULT_LEGACY_COOKIE_PATHS,
    DEFAULT_PASSWORD_COST, DEFAULT_PORT, DEFAULT_REFRESH_TTL_SECS, KAKAO_TOKEN_URL,
    KAKAO_USERINFO_URL, MAX_PASSWORD_LEN, MIN_JWT_SECRET_LEN, NAVER_TOKEN_URL,
    NAVER_USERINFO_URL,
};

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Backend holding session records and revoked tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// Cookie SameSite Enum
// =============================================================================

/// SameSite attribute applied to every auth cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieSameSite {
    Strict,
    Lax,
    /// Cross-site capable (requires Secure)
    #[default]
    None,
}

impl fmt::Display for CookieSameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieSameSite::Strict => write!(f, "strict"),
            CookieSameSite::Lax => write!(f, "lax"),
            CookieSameSite::None => write!(f, "none"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON, all fields optional)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
}

/// Authentication configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    pub jwt_secret: Option<String>,
    pub access_ttl_secs: Option<u64>,
    pub refresh_ttl_secs: Option<u64>,
    pub password_cost: Option<u32>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Cookie scope configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CookiesFileConfig {
    /// Canonical domain for issued cookies
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: Option<bool>,
    pub same_site: Option<CookieSameSite>,
    /// Domains previous releases issued cookies under
    pub legacy_domains: Option<Vec<String>>,
    /// Paths previous releases issued cookies under
    pub legacy_paths: Option<Vec<String>>,
}

/// Redis cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    /// Connection URL for Redis-compatible backends
    pub url: Option<String>,
}

/// Database configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub cache: Option<CacheBackendType>,
    pub redis: Option<RedisFileConfig>,
}

/// OAuth client registration for one external provider
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OAuthClientFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

/// Federation configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FederationFileConfig {
    pub kakao: Option<OAuthClientFileConfig>,
    pub naver: Option<OAuthClientFileConfig>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub cookies: Option<CookiesFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub federation: Option<FederationFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
            if server.allowed_origins.is_some() {
                tracing::trace!(origins = ?server.allowed_origins, "Merging server.allowed_origins");
                current.allowed_origins = server.allowed_origins;
            }
        }

        // Auth (secrets are never logged)
        if let Some(auth) = other.auth {
            let current = self.auth.get_or_insert_with(AuthFileConfig::default);
            if auth.jwt_secret.is_some() {
                tracing::trace!("Merging auth.jwt_secret");
                current.jwt_secret = auth.jwt_secret;
            }
            if auth.access_ttl_secs.is_some() {
                tracing::trace!(ttl = ?auth.access_ttl_secs, "Merging auth.access_ttl_secs");
                current.access_ttl_secs = auth.access_ttl_secs;
            }
            if auth.refresh_ttl_secs.is_some() {
                tracing::trace!(ttl = ?auth.refresh_ttl_secs, "Merging auth.refresh_ttl_secs");
                current.refresh_ttl_secs = auth.refresh_ttl_secs;
            }
            if auth.password_cost.is_some() {
                tracing::trace!(cost = ?auth.password_cost, "Merging auth.password_cost");
                current.password_cost = auth.password_cost;
            }
            if auth.admin_email.is_some() {
                tracing::trace!(email = ?auth.admin_email, "Merging auth.admin_email");
                current.admin_email = auth.admin_email;
            }
            if auth.admin_password.is_some() {
                tracing::trace!("Merging auth.admin_password");
                current.admin_password = auth.admin_password;
            }
        }

        // Cookies
        if let Some(cookies) = other.cookies {
            let current = self.cookies.get_or_insert_with(CookiesFileConfig::default);
            if cookies.domain.is_some() {
                tracing::trace!(domain = ?cookies.domain, "Merging cookies.domain");
                current.domain = cookies.domain;
            }
            if cookies.path.is_some() {
                tracing::trace!(path = ?cookies.path, "Merging cookies.path");
                current.path = cookies.path;
            }
            if cookies.secure.is_some() {
                tracing::trace!(secure = ?cookies.secure, "Merging cookies.secure");
                current.secure = cookies.secure;
            }
            if cookies.same_site.is_some() {
                tracing::trace!(same_site = ?cookies.same_site, "Merging cookies.same_site");
                current.same_site = cookies.same_site;
            }
            if cookies.legacy_domains.is_some() {
                tracing::trace!(domains = ?cookies.legacy_domains, "Merging cookies.legacy_domains");
                current.legacy_domains = cookies.legacy_domains;
            }
            if cookies.legacy_paths.is_some() {
                tracing::trace!(paths = ?cookies.legacy_paths, "Merging cookies.legacy_paths");
                current.legacy_paths = cookies.legacy_paths;
            }
        }

        // Database (cache backend)
        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            if database.cache.is_some() {
                tracing::trace!(cache = ?database.cache, "Merging database.cache");
                current.cache = database.cache;
            }
            if let Some(redis) = database.redis {
                let current_redis = current.redis.get_or_insert_with(RedisFileConfig::default);
                if redis.url.is_some() {
                    tracing::trace!("Merging database.redis.url");
                    current_redis.url = redis.url;
                }
            }
        }

        // Federation (per-provider sections replace each other field by field)
        if let Some(federation) = other.federation {
            let current = self
                .federation
                .get_or_insert_with(FederationFileConfig::default);
            if let Some(kakao) = federation.kakao {
                tracing::trace!("Merging federation.kakao");
                merge_oauth_client(current.kakao.get_or_insert_with(Default::default), kakao);
            }
            if let Some(naver) = federation.naver {
                tracing::trace!("Merging federation.naver");
                merge_oauth_client(current.naver.get_or_insert_with(Default::default), naver);
            }
        }
    }
}

fn merge_oauth_client(current: &mut OAuthClientFileConfig, other: OAuthClientFileConfig) {
    if other.client_id.is_some() {
        current.client_id = other.client_id;
    }
    if other.client_secret.is_some() {
        current.client_secret = other.client_secret;
    }
    if other.redirect_uri.is_some() {
        current.redirect_uri = other.redirect_uri;
    }
    if other.token_url.is_some() {
        current.token_url = other.token_url;
    }
    if other.userinfo_url.is_some() {
        current.userinfo_url = other.userinfo_url;
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
}

/// Administrator account ensured at startup
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Token signing secret; a random one is generated at startup when absent
    pub jwt_secret: Option<String>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// bcrypt work factor
    pub password_cost: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "***"))
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("password_cost", &self.password_cost)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

/// Cookie scope configuration
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Canonical domain; `None` issues host-only cookies
    pub domain: Option<String>,
    /// Canonical path
    pub path: String,
    pub secure: bool,
    pub same_site: CookieSameSite,
    pub legacy_domains: Vec<String>,
    pub legacy_paths: Vec<String>,
}

/// Redis cache configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL for Redis-compatible backends
    pub url: String,
}

/// Cache configuration (used internally by CacheService)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackendType,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub cache: CacheBackendType,
    pub redis: Option<RedisConfig>,
}

impl DatabaseConfig {
    /// Build a CacheConfig for use by CacheService
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            backend: self.cache,
            redis_url: self.redis.as_ref().map(|r| r.url.clone()),
        }
    }
}

/// OAuth client registration (final/runtime)
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_url: String,
    pub userinfo_url: String,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

/// Federation configuration; a provider is enabled once its client id is set
#[derive(Debug, Clone, Default)]
pub struct FederationConfig {
    pub kakao: Option<OAuthClientConfig>,
    pub naver: Option<OAuthClientConfig>,
}

impl OAuthClientConfig {
    fn from_file(
        file: Option<OAuthClientFileConfig>,
        token_url: &str,
        userinfo_url: &str,
    ) -> Option<Self> {
        let file = file?;
        let client_id = file.client_id.filter(|id| !id.is_empty())?;
        Some(Self {
            client_id,
            client_secret: file.client_secret.filter(|s| !s.is_empty()),
            redirect_uri: file.redirect_uri,
            token_url: file.token_url.unwrap_or_else(|| token_url.to_string()),
            userinfo_url: file.userinfo_url.unwrap_or_else(|| userinfo_url.to_string()),
        })
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cookies: CookieConfig,
    pub database: DatabaseConfig,
    pub federation: FederationConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.logolab/logolab.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Profile dir - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_sources(cli, file_config)
    }

    /// Layer CLI/env values over a merged file config and validate the result
    fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_cookies = file_config.cookies.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_federation = file_config.federation.unwrap_or_default();

        // server
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);
        let allowed_origins = cli
            .allowed_origins
            .clone()
            .or(file_server.allowed_origins)
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_ORIGINS
                    .iter()
                    .map(|o| o.to_string())
                    .collect()
            });

        // auth
        let jwt_secret = cli
            .jwt_secret
            .clone()
            .or(file_auth.jwt_secret)
            .filter(|s| !s.is_empty());
        let access_ttl_secs = cli
            .access_ttl_secs
            .or(file_auth.access_ttl_secs)
            .unwrap_or(DEFAULT_ACCESS_TTL_SECS);
        let refresh_ttl_secs = cli
            .refresh_ttl_secs
            .or(file_auth.refresh_ttl_secs)
            .unwrap_or(DEFAULT_REFRESH_TTL_SECS);
        let admin_email = cli.admin_email.clone().or(file_auth.admin_email);
        let admin_password = cli.admin_password.clone().or(file_auth.admin_password);
        let bootstrap_admin = match (admin_email, admin_password) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!(
                    "Configuration error: auth.admin_email and auth.admin_password must be set together"
                );
            }
            (None, None) => None,
        };
        let auth = AuthConfig {
            jwt_secret,
            access_ttl: Duration::from_secs(access_ttl_secs),
            refresh_ttl: Duration::from_secs(refresh_ttl_secs),
            password_cost: file_auth.password_cost.unwrap_or(DEFAULT_PASSWORD_COST),
            bootstrap_admin,
        };

        // cookies
        let cookies = CookieConfig {
            domain: cli
                .cookie_domain
                .clone()
                .or(file_cookies.domain)
                .filter(|d| !d.is_empty()),
            path: file_cookies
                .path
                .unwrap_or_else(|| DEFAULT_COOKIE_PATH.to_string()),
            secure: cli.cookie_secure.or(file_cookies.secure).unwrap_or(true),
            same_site: file_cookies.same_site.unwrap_or_default(),
            legacy_domains: file_cookies.legacy_domains.unwrap_or_default(),
            legacy_paths: file_cookies.legacy_paths.unwrap_or_else(|| {
                DEFAULT_LEGACY_COOKIE_PATHS
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            }),
        };

        // cache
        let cache_backend = cli
            .cache_backend
            .or(file_database.cache)
            .unwrap_or_default();
        let redis = if cache_backend == CacheBackendType::Redis {
            let file_redis = file_database.redis.unwrap_or_default();
            let url = cli
                .cache_redis_url
                .clone()
                .or(file_redis.url)
                .unwrap_or_default();
            Some(RedisConfig { url })
        } else {
            None
        };
        let database = DatabaseConfig {
            cache: cache_backend,
            redis,
        };

        // federation
        let federation = FederationConfig {
            kakao: OAuthClientConfig::from_file(
                file_federation.kakao,
                KAKAO_TOKEN_URL,
                KAKAO_USERINFO_URL,
            ),
            naver: OAuthClientConfig::from_file(
                file_federation.naver,
                NAVER_TOKEN_URL,
                NAVER_USERINFO_URL,
            ),
        };

        let config = Self {
            server: ServerConfig {
                host,
                port,
                allowed_origins,
            },
            auth,
            cookies,
            database,
            federation,
        };

        config.validate()?;
        tracing::debug!(config = ?config, "Final config");
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.auth.access_ttl.is_zero() || self.auth.refresh_ttl.is_zero() {
            anyhow::bail!("Configuration error: token lifetimes must be greater than 0");
        }
        if self.auth.access_ttl >= self.auth.refresh_ttl {
            anyhow::bail!(
                "Configuration error: auth.access_ttl_secs ({}) must be shorter than auth.refresh_ttl_secs ({})",
                self.auth.access_ttl.as_secs(),
                self.auth.refresh_ttl.as_secs()
            );
        }
        if let Some(secret) = &self.auth.jwt_secret
            && secret.len() < MIN_JWT_SECRET_LEN
        {
            anyhow::bail!(
                "Configuration error: auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            );
        }
        if !(4..=31).contains(&self.auth.password_cost) {
            anyhow::bail!("Configuration error: auth.password_cost must be between 4 and 31");
        }
        if let Some(admin) = &self.auth.bootstrap_admin
            && (admin.password.is_empty() || admin.password.len() > MAX_PASSWORD_LEN)
        {
            anyhow::bail!(
                "Configuration error: auth.admin_password must be 1-{} bytes",
                MAX_PASSWORD_LEN
            );
        }

        if !self.cookies.path.starts_with('/') {
            anyhow::bail!("Configuration error: cookies.path must start with '/'");
        }
        if let Some(path) = self
            .cookies
            .legacy_paths
            .iter()
            .find(|p| !p.starts_with('/'))
        {
            anyhow::bail!(
                "Configuration error: cookies.legacy_paths entry '{}' must start with '/'",
                path
            );
        }
        if self.cookies.same_site == CookieSameSite::None && !self.cookies.secure {
            anyhow::bail!(
                "Configuration error: cookies.same_site 'none' requires cookies.secure = true"
            );
        }

        // Redis URL required when using Redis cache backend
        if self.database.cache == CacheBackendType::Redis
            && self
                .database
                .redis
                .as_ref()
                .is_none_or(|r| r.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.redis.url is required when database.cache is 'redis'"
            );
        }

        if self.auth.jwt_secret.is_none() {
            tracing::warn!(
                "auth.jwt_secret not set; a random secret will be generated and sessions will not survive restarts"
            );
        }
        if is_all_interfaces(&self.server.host) && !self.cookies.secure {
            tracing::warn!("Serving on all interfaces with non-Secure auth cookies");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.logolab/logolab.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}
