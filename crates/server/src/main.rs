use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use questline_core::{
    load_config, validate_config, HttpExecutorClient, PreferenceStore, QuestGateway,
    QuestOrchestrator, SignalBus, SqlitePreferenceStore, TaskExecutor,
};
use questline_server::api::create_router;
use questline_server::state::AppState;

/// Capacity of the executor signal fan-out.
const SIGNAL_BUFFER_SIZE: usize = 256;

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

    // Config path: QUESTLINE_CONFIG, then the first argument, then ./config.toml
    let config_path = std::env::var("QUESTLINE_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Executor bridge: {}", config.executor.url);
    info!("Database path: {:?}", config.database.path);

    // Preference store
    let store: Arc<dyn PreferenceStore> = Arc::new(
        SqlitePreferenceStore::new(&config.database.path)
            .context("Failed to open preference store")?,
    );
    info!("Preference store initialized");

    // One bridge client serves as both gateway and executor
    let bridge = Arc::new(
        HttpExecutorClient::new(config.executor.clone())
            .context("Failed to create executor bridge client")?,
    );
    let gateway: Arc<dyn QuestGateway> = bridge.clone();
    let executor: Arc<dyn TaskExecutor> = bridge;

    let signals = SignalBus::new(SIGNAL_BUFFER_SIZE);

    let orchestrator = QuestOrchestrator::new(
        config.orchestrator.clone(),
        gateway,
        executor,
        Arc::new(signals.clone()),
        store,
        config.preferences.clone(),
    );
    orchestrator.start().await;

    // Initial quest list; the UI can retry through the refresh endpoint
    if let Err(e) = orchestrator.refresh_quests(false).await {
        error!("Initial quest refresh failed: {}", e);
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator.clone(),
        signals,
    ));
    let app = create_router(state);

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

    // Tear down any live session before exiting
    info!("Stopping orchestrator...");
    orchestrator.shutdown().await;
    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
