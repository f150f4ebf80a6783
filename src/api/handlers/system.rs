//! System endpoints: health check and feature toggle visibility.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::config::{ALLOCATIONS_ENV, INGEST_ENV, PAYOUT_ENV};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// One feature toggle's state and its rollback lever.
#[derive(Debug, Serialize, ToSchema)]
struct ToggleInfo {
    name: &'static str,
    enabled: bool,
    env_var: &'static str,
    rollback: &'static str,
}

/// `GET /toggles` — Current feature toggle states.
#[utoipa::path(
    get,
    path = "/api/v1/toggles",
    tag = "System",
    summary = "List feature toggles",
    description = "Returns the current state of the three settlement toggles together with the environment variable and rollback instructions for each. Toggles are re-read from the environment on every request.",
    responses(
        (status = 200, description = "Toggle states", body = Vec<ToggleInfo>),
    )
)]
pub async fn get_toggles(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.toggles.snapshot();
    let toggles = vec![
        ToggleInfo {
            name: "ingest",
            enabled: snapshot.ingest,
            env_var: INGEST_ENV,
            rollback: "set SETTLEMENT_INGEST=false to stop accepting settlement events; \
                       unset or set to true to restore",
        },
        ToggleInfo {
            name: "allocations",
            enabled: snapshot.allocations,
            env_var: ALLOCATIONS_ENV,
            rollback: "set SETTLEMENT_ALLOC=false to record events without ledger writes; \
                       unset or set to true to restore",
        },
        ToggleInfo {
            name: "payout",
            enabled: snapshot.payout,
            env_var: PAYOUT_ENV,
            rollback: "set SETTLEMENT_PAYOUT=false to freeze batch creation and \
                       confirmation; unset or set to true to restore",
        },
    ];
    (StatusCode::OK, Json(toggles))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// System routes mounted under /api/v1.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/toggles", get(get_toggles))
}
