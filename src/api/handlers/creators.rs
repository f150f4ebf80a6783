//! Distribution ledger endpoints: creator and referrer positions, share
//! history, and the hold-release admin operation.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreatorSummaryResponse, HistoryEntryDto, HistoryResponse, ListParams, PageMeta,
    ReferrerSummaryResponse, ReleaseResponse,
};
use crate::app_state::AppState;
use crate::domain::{CreatorId, ShareStatus};
use crate::error::{ErrorResponse, SettlementError};

/// `GET /creators/:id` — Aggregated settlement position of one creator.
///
/// # Errors
///
/// Returns [`SettlementError::PersistenceError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/creators/{id}",
    tag = "Creators",
    summary = "Get creator settlement summary",
    description = "Returns per-status and per-channel totals over every share the creator holds. Unknown creators return all-zero figures.",
    params(
        ("id" = String, Path, description = "Opaque creator identifier"),
    ),
    responses(
        (status = 200, description = "Creator summary", body = CreatorSummaryResponse),
    )
)]
pub async fn get_creator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let summary = state
        .settlement
        .creator_summary(&CreatorId::from(id))
        .await?;
    Ok(Json(CreatorSummaryResponse::from(summary)))
}

/// `GET /creators/:id/history` — One creator's share history.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidRequest`] for an unknown status
/// filter.
#[utoipa::path(
    get,
    path = "/api/v1/creators/{id}/history",
    tag = "Creators",
    summary = "Get creator share history",
    description = "Returns the creator's share rows joined with their settlement-event context, newest first, optionally filtered by status.",
    params(
        ("id" = String, Path, description = "Opaque creator identifier"),
        ("status" = Option<String>, Query, description = "Status filter: held, payable, or paid"),
        ("limit" = Option<i64>, Query, description = "Maximum rows (default 20, max 100)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "Share history", body = HistoryResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
    )
)]
pub async fn get_creator_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, SettlementError> {
    let params = params.clamped();
    let status = match params.status.as_deref() {
        Some(raw) => Some(ShareStatus::from_str(raw).map_err(|_| {
            SettlementError::InvalidRequest(format!("unknown share status filter: {raw}"))
        })?),
        None => None,
    };

    let entries = state
        .settlement
        .creator_history(&CreatorId::from(id), status, params.limit, params.offset)
        .await?;
    let data: Vec<HistoryEntryDto> = entries.into_iter().map(HistoryEntryDto::from).collect();
    let count = data.len() as i64;

    Ok(Json(HistoryResponse {
        data,
        pagination: PageMeta {
            limit: params.limit,
            offset: params.offset,
            count,
        },
    }))
}

/// `GET /referrers/:id` — Aggregated growth position of one referrer.
///
/// # Errors
///
/// Returns [`SettlementError::PersistenceError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/referrers/{id}",
    tag = "Creators",
    summary = "Get referrer growth summary",
    description = "Returns per-status totals over the referrer-bucket growth shares credited to this referrer, plus the number of referred events.",
    params(
        ("id" = String, Path, description = "Opaque referrer identifier"),
    ),
    responses(
        (status = 200, description = "Referrer summary", body = ReferrerSummaryResponse),
    )
)]
pub async fn get_referrer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let summary = state
        .settlement
        .referrer_summary(&CreatorId::from(id))
        .await?;
    Ok(Json(ReferrerSummaryResponse::from(summary)))
}

/// `POST /shares/release` — Release every hold whose window has expired.
///
/// # Errors
///
/// Returns [`SettlementError::PersistenceError`] on storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/shares/release",
    tag = "Creators",
    summary = "Release expired holds",
    description = "Flips every held share whose hold window has passed to payable, across creator and growth shares. Intended to be called by a scheduler; running it twice is harmless.",
    responses(
        (status = 200, description = "Release outcome", body = ReleaseResponse),
    )
)]
pub async fn release_shares(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state.settlement.release_held_shares().await?;
    Ok(Json(ReleaseResponse::from(outcome)))
}

/// Distribution ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/creators/{id}", get(get_creator))
        .route("/creators/{id}/history", get(get_creator_history))
        .route("/referrers/{id}", get(get_referrer))
        .route("/shares/release", post(release_shares))
}
