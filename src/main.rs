use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use api_pilot::config::{CliArgs, PilotConfig};
use api_pilot::event_log::{LogLevel, LogSource};
use api_pilot::server;
use api_pilot::state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_pilot=info,tower_http=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    info!("Starting api-pilot v{}", env!("CARGO_PKG_VERSION"));

    let config = PilotConfig::from_args(args);
    info!("Prompt model: {}", config.model_id);
    if config.api_key.is_none() {
        warn!("No API key configured; plan suggestion and script generation will fail");
    }
    if let Some(seed) = config.seed {
        info!("Simulation seed: {}", seed);
    }
    let port = config.port;

    let state: SharedState = Arc::new(AppState::from_config(config)?);
    state
        .logs()
        .emit(
            LogSource::Server,
            LogLevel::Info,
            format!("api-pilot starting on port {}", port),
        )
        .await;

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("api-pilot listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    info!("api-pilot shutting down");
    state.wizard.shutdown().await;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
    state
        .logs()
        .emit(LogSource::Server, LogLevel::Info, "Shutdown signal received")
        .await;
}
