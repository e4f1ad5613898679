use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use copilot_starter::{
    config::Config, routes, services::storage_gateway::StorageGateway, state::AppState,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info,tower_http=debug");
    let config = Config::from_env()?;

    let storage =
        match StorageGateway::from_connection_string(config.storage_connection_string.as_deref()) {
            Ok(gateway) => gateway,
            Err(e) => {
                error!(error = %e, "invalid storage connection string; storage endpoints disabled");
                StorageGateway::unconfigured()
            }
        };
    if !storage.is_configured() {
        warn!("no storage configured; /api/blobs and /api/table will answer 500");
    }

    let state = Arc::new(AppState::new(storage));

    let app = routes::create_router(&config.public_dir)
        .with_state(state)
        .layer(CorsLayer::very_permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, public_dir = %config.public_dir.display(), "copilot starter listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
