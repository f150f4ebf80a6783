//! REST endpoint handlers organized by resource.

pub mod batches;
pub mod creators;
pub mod events;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(batches::routes())
        .merge(creators::routes())
        .merge(system::api_routes())
}
