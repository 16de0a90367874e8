use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelpilot_core::{
    load_config, validate_config, Clock, CredentialStore, Session, SessionBackends,
    SqliteCredentialStore, SystemClock,
};
use reelpilot_server::api::{create_router, WsBroadcaster};
use reelpilot_server::state::AppState;

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

    // Determine config path
    let config_path = std::env::var("REELPILOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Generation backend: {}", config.generation.base_url);

    // Settings store
    let store: Arc<dyn CredentialStore> = Arc::new(
        SqliteCredentialStore::new(&config.database.path)
            .context("Failed to open settings store")?,
    );
    info!("Settings store initialized");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backends = SessionBackends::from_config(&config, clock.clone())
        .context("Failed to create backend clients")?;

    let session = Arc::new(
        Session::new(&config, backends, store, clock).context("Failed to create session")?,
    );

    // Relay item and batch events to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    let relay = ws_broadcaster.forward(&session);
    info!("WebSocket broadcaster initialized");

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&session),
        ws_broadcaster,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight pipelines end as errors rather than hanging.
    info!("Server shutting down...");
    session.shutdown();
    relay.abort();

    Ok(())
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
