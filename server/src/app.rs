//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::auth::{
    AuthenticationGate, AuthorizationPolicy, CookieTransport, RouteTable, TokenCodec,
};
use crate::api::{ApiServer, AuthManager};
use crate::core::banner;
use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::cache::CacheService;
use crate::data::{HttpFederation, InMemoryDirectory, RevocationList, SessionStore};
use crate::utils::crypto::generate_secret;

/// Signing key length in bytes when none is configured
const GENERATED_SECRET_BYTES: usize = 32;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub cache: Arc<CacheService>,
    pub auth: Arc<AuthManager>,
    pub gate: Arc<AuthenticationGate>,
    pub policy: Arc<AuthorizationPolicy>,
    pub cookies: Arc<CookieTransport>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli_config = cli::parse();
        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let secret = match config.auth.jwt_secret.clone() {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "No JWT secret configured; using a generated key. Sessions will not survive a restart"
                );
                generate_secret(GENERATED_SECRET_BYTES)
            }
        };

        let cache = Arc::new(
            CacheService::new(&config.database.cache_config())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let codec = Arc::new(TokenCodec::new(
            secret.as_bytes(),
            config.auth.access_ttl,
            config.auth.refresh_ttl,
        ));
        let sessions = SessionStore::new(cache.clone());
        let revocations = RevocationList::new(cache.clone());
        let federation = HttpFederation::new(config.federation.clone())
            .context("Failed to initialize identity federation")?;

        let auth = Arc::new(AuthManager::new(
            codec.clone(),
            sessions,
            revocations.clone(),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(federation),
            config.auth.password_cost,
        ));

        if let Some(admin) = &config.auth.bootstrap_admin {
            let record = auth
                .ensure_admin(admin)
                .await
                .context("Failed to provision bootstrap administrator")?;
            tracing::info!(email = %record.email, "Administrator account ready");
        }

        let routes = Arc::new(RouteTable::default_routes());
        let gate = Arc::new(AuthenticationGate::new(codec, revocations, routes.clone()));
        let policy = Arc::new(AuthorizationPolicy::new(routes));
        let cookies = Arc::new(CookieTransport::new(config.cookies.clone()));

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            cache,
            auth,
            gate,
            policy,
            cookies,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            app.cache.backend_name(),
            app.config.cookies.domain.as_deref(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.cache
                    .start_health_check_task(self.shutdown.subscribe()),
            )
            .await;

        tracing::debug!("Background tasks started");
    }
}
