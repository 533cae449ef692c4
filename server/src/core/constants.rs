// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "LogoLab";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "logolab";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".logolab";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "logolab.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "LOGOLAB_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "LOGOLAB_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "LOGOLAB_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "LOGOLAB_LOG";

/// Environment variable for extra CORS origins (comma separated)
pub const ENV_ALLOWED_ORIGINS: &str = "LOGOLAB_ALLOWED_ORIGINS";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Frontend dev server origins allowed by default
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:4173"];

// =============================================================================
// Environment Variables - Authentication
// =============================================================================

/// HMAC secret used to sign access and refresh tokens
pub const ENV_JWT_SECRET: &str = "LOGOLAB_JWT_SECRET";

/// Access token lifetime in seconds
pub const ENV_ACCESS_TTL_SECS: &str = "LOGOLAB_ACCESS_TTL_SECS";

/// Refresh token lifetime in seconds
pub const ENV_REFRESH_TTL_SECS: &str = "LOGOLAB_REFRESH_TTL_SECS";

/// Email of the administrator account created at startup
pub const ENV_ADMIN_EMAIL: &str = "LOGOLAB_ADMIN_EMAIL";

/// Password of the administrator account created at startup
pub const ENV_ADMIN_PASSWORD: &str = "LOGOLAB_ADMIN_PASSWORD";

// =============================================================================
// Authentication
// =============================================================================

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "access-token";

/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refresh-token";

/// Default access token lifetime (30 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 30 * 60;

/// Default refresh token lifetime (14 days)
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 14 * 24 * 60 * 60;

/// Minimum accepted signing secret length in bytes (HS256 key size)
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Default bcrypt work factor for local passwords
pub const DEFAULT_PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;

/// Maximum password length accepted by bcrypt
pub const MAX_PASSWORD_LEN: usize = 72;

// =============================================================================
// Environment Variables - Cookies
// =============================================================================

/// Canonical cookie domain (unset = host-only cookies)
pub const ENV_COOKIE_DOMAIN: &str = "LOGOLAB_COOKIE_DOMAIN";

/// Whether cookies carry the Secure attribute
pub const ENV_COOKIE_SECURE: &str = "LOGOLAB_COOKIE_SECURE";

// =============================================================================
// Cookie Defaults
// =============================================================================

/// Default canonical cookie path
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Paths under which cookies were issued by earlier releases
pub const DEFAULT_LEGACY_COOKIE_PATHS: &[&str] = &["/api"];

// =============================================================================
// Body Size Limits
// =============================================================================

/// Default body size limit for all routes
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Auth endpoint body limit (credentials only)
pub const AUTH_BODY_LIMIT: usize = 16 * 1024;

// =============================================================================
// Environment Variables - Cache
// =============================================================================

/// Environment variable for cache backend (memory or redis)
pub const ENV_CACHE_BACKEND: &str = "LOGOLAB_CACHE_BACKEND";

/// Environment variable for Redis-compatible cache URL
pub const ENV_CACHE_REDIS_URL: &str = "LOGOLAB_CACHE_REDIS_URL";

// =============================================================================
// Cache Keys
// =============================================================================

/// Cache key version prefix (bump to invalidate all stored sessions)
pub const CACHE_KEY_VERSION: &str = "v1";

// =============================================================================
// Federation
// =============================================================================

/// Kakao OAuth token endpoint
pub const KAKAO_TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";

/// Kakao user profile endpoint
pub const KAKAO_USERINFO_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// Naver OAuth token endpoint
pub const NAVER_TOKEN_URL: &str = "https://nid.naver.com/oauth2.0/token";

/// Naver user profile endpoint
pub const NAVER_USERINFO_URL: &str = "https://openapi.naver.com/v1/nid/me";

/// Timeout for calls to external identity providers
pub const FEDERATION_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
