//! settlement-engine server entry point.
//!
//! Starts the Axum HTTP server over the configured store.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use settlement_engine::api;
use settlement_engine::app_state::AppState;
use settlement_engine::config::{EngineConfig, ToggleGate};
use settlement_engine::persistence::{MemoryStore, PostgresStore, SettlementStore};
use settlement_engine::service::SettlementService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = EngineConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting settlement-engine");

    // Build persistence layer
    let store: Arc<dyn SettlementStore> = if config.persistence_enabled {
        Arc::new(PostgresStore::connect(&config).await?)
    } else {
        tracing::warn!("persistence disabled, using volatile in-memory store");
        Arc::new(MemoryStore::new())
    };

    // Build service layer
    let settlement = Arc::new(SettlementService::new(store, config.hold_days));

    // Build application state
    let app_state = AppState {
        settlement,
        toggles: ToggleGate::from_env(),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
