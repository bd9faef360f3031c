use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subscout_core::{
    config::DEFAULT_CONFIG_PATH, load_config, validate_config, AssrtProvider, Config,
    OpenSubtitlesProvider, ProviderRegistry, SanitizedConfig,
};
use subscout_server::api::{create_router, WsBroadcaster};
use subscout_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("SubScout v{} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("SUBSCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Media paths: {:?}", config.library.media_paths);

    // Config hash identifies the effective configuration in logs
    let config_json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    if config.security.app_secret.is_empty() {
        warn!("security.app_secret is empty; provider credentials are stored unencrypted");
    }

    let registry = build_registry(&config)?;
    info!("Registered providers: {:?}", registry.names());

    // Create WebSocket broadcaster for real-time updates
    let ws_broadcaster = WsBroadcaster::default();

    // Create app state (stores, orchestrator, scan runner)
    let state = Arc::new(AppState::open(config.clone(), registry, ws_broadcaster)?);
    info!("Stores initialized");

    let seeded = state.seed_credentials()?;
    if !seeded.is_empty() {
        info!("Seeded credentials from config for: {:?}", seeded);
    }

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    let shutdown = state.shutdown_token().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Server shutting down...");
            // Abort in-flight searches so open requests can complete.
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Register the built-in catalogs.
fn build_registry(config: &Config) -> Result<ProviderRegistry> {
    let assrt = AssrtProvider::new(config.providers.assrt.rate_limit_rpm)
        .context("Failed to create ASSRT client")?;
    let opensubtitles =
        OpenSubtitlesProvider::new().context("Failed to create OpenSubtitles client")?;

    Ok(ProviderRegistry::new()
        .with(Arc::new(assrt))
        .with(Arc::new(opensubtitles)))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
