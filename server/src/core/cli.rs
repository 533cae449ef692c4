use clap::Parser;

use std::path::PathBuf;

use super::config::CacheBackendType;
use super::constants::{
    ENV_ACCESS_TTL_SECS, ENV_ADMIN_EMAIL, ENV_ADMIN_PASSWORD, ENV_ALLOWED_ORIGINS,
    ENV_CACHE_BACKEND, ENV_CACHE_REDIS_URL, ENV_CONFIG, ENV_COOKIE_DOMAIN, ENV_COOKIE_SECURE,
    ENV_HOST, ENV_JWT_SECRET, ENV_PORT, ENV_REFRESH_TTL_SECS,
};

#[derive(Parser)]
#[command(name = "logolab")]
#[command(version, about = "LogoLab session server", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Additional allowed CORS origins (comma separated)
    #[arg(long, env = ENV_ALLOWED_ORIGINS, value_delimiter = ',')]
    pub allowed_origins: Option<Vec<String>>,

    // Auth options
    /// Token signing secret (at least 32 bytes)
    #[arg(long, env = ENV_JWT_SECRET, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = ENV_ACCESS_TTL_SECS)]
    pub access_ttl_secs: Option<u64>,

    /// Refresh token lifetime in seconds
    #[arg(long, env = ENV_REFRESH_TTL_SECS)]
    pub refresh_ttl_secs: Option<u64>,

    /// Administrator account created at startup when missing
    #[arg(long, env = ENV_ADMIN_EMAIL)]
    pub admin_email: Option<String>,

    /// Password for the startup administrator account
    #[arg(long, env = ENV_ADMIN_PASSWORD, hide_env_values = true)]
    pub admin_password: Option<String>,

    // Cookie options
    /// Canonical cookie domain (omit for host-only cookies)
    #[arg(long, env = ENV_COOKIE_DOMAIN)]
    pub cookie_domain: Option<String>,

    /// Set the Secure attribute on cookies
    #[arg(long, env = ENV_COOKIE_SECURE)]
    pub cookie_secure: Option<bool>,

    // Cache options
    /// Session store backend (memory or redis)
    #[arg(long, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Redis-compatible URL (Redis, Valkey, Dragonfly), e.g. redis://host:port/db
    #[arg(long, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,
}

/// Parse cache backend type from CLI/env string
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis",
            s
        )),
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub allowed_origins: Option<Vec<String>>,
    pub jwt_secret: Option<String>,
    pub access_ttl_secs: Option<u64>,
    pub refresh_ttl_secs: Option<u64>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cookie_domain: Option<String>,
    pub cookie_secure: Option<bool>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_redis_url: Option<String>,
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        allowed_origins: cli.allowed_origins,
        jwt_secret: cli.jwt_secret,
        access_ttl_secs: cli.access_ttl_secs,
        refresh_ttl_secs: cli.refresh_ttl_secs,
        admin_email: cli.admin_email,
        admin_password: cli.admin_password,
        cookie_domain: cli.cookie_domain,
        cookie_secure: cli.cookie_secure,
        cache_backend: cli.cache_backend,
        cache_redis_url: cli.cache_redis_url,
    }
}
