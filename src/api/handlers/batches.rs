//! Payout batch endpoints: create, confirm, fetch, list, stats.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BatchDetailResponse, BatchDto, BatchListResponse, CreateBatchRequest, ListParams, PageMeta,
    StatsResponse,
};
use crate::app_state::AppState;
use crate::domain::{BatchId, BatchStatus};
use crate::error::{ErrorResponse, SettlementError};

/// `POST /batches` — Create a draft payout batch.
///
/// # Errors
///
/// Returns [`SettlementError::NoPayableShares`] when nothing is eligible
/// or [`SettlementError::ToggleDisabled`] when payouts are off.
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    tag = "Payouts",
    summary = "Create a payout batch",
    description = "Claims every payable, unclaimed creator share created at or before the cutoff into a new draft batch. The body is optional; without one the cutoff defaults to now. Growth shares are never batched.",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Draft batch created", body = BatchDetailResponse),
        (status = 422, description = "No payable shares eligible", body = ErrorResponse),
        (status = 503, description = "Payouts are toggled off", body = ErrorResponse),
    )
)]
pub async fn create_batch(
    State(state): State<AppState>,
    body: Option<Json<CreateBatchRequest>>,
) -> Result<impl IntoResponse, SettlementError> {
    let toggles = state.toggles.snapshot();
    let batch_date = body.and_then(|Json(req)| req.batch_date);
    let detail = state.settlement.create_batch(batch_date, toggles).await?;
    Ok((StatusCode::CREATED, Json(BatchDetailResponse::from(detail))))
}

/// `POST /batches/:id/confirm` — Confirm a payout batch.
///
/// # Errors
///
/// Returns [`SettlementError::BatchNotFound`] for an unknown id or
/// [`SettlementError::ToggleDisabled`] when payouts are off.
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/confirm",
    tag = "Payouts",
    summary = "Confirm a payout batch",
    description = "Marks the batch confirmed and every claimed share paid. Idempotent: confirming an already-confirmed batch returns it unchanged.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payout batch UUID"),
    ),
    responses(
        (status = 200, description = "Confirmed batch", body = BatchDto),
        (status = 404, description = "Batch not found", body = ErrorResponse),
        (status = 503, description = "Payouts are toggled off", body = ErrorResponse),
    )
)]
pub async fn confirm_batch(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let toggles = state.toggles.snapshot();
    let batch = state
        .settlement
        .confirm_batch(BatchId::from_uuid(id), toggles)
        .await?;
    Ok(Json(BatchDto::from(batch)))
}

/// `GET /batches/:id` — Fetch a batch with its claimed share ids.
///
/// # Errors
///
/// Returns [`SettlementError::BatchNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    tag = "Payouts",
    summary = "Get payout batch detail",
    description = "Returns the batch record together with the ids of every creator share it claimed.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payout batch UUID"),
    ),
    responses(
        (status = 200, description = "Batch detail", body = BatchDetailResponse),
        (status = 404, description = "Batch not found", body = ErrorResponse),
    )
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let detail = state.settlement.get_batch(BatchId::from_uuid(id)).await?;
    Ok(Json(BatchDetailResponse::from(detail)))
}

/// `GET /batches` — List payout batches, newest first.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidRequest`] for an unknown status
/// filter.
#[utoipa::path(
    get,
    path = "/api/v1/batches",
    tag = "Payouts",
    summary = "List payout batches",
    description = "Returns batches newest first, optionally filtered by status.",
    params(
        ("status" = Option<String>, Query, description = "Status filter: draft or confirmed"),
        ("limit" = Option<i64>, Query, description = "Maximum rows (default 20, max 100)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "Batch list", body = BatchListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
    )
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, SettlementError> {
    let params = params.clamped();
    let status = match params.status.as_deref() {
        Some(raw) => Some(BatchStatus::from_str(raw).map_err(|_| {
            SettlementError::InvalidRequest(format!("unknown batch status filter: {raw}"))
        })?),
        None => None,
    };

    let batches = state
        .settlement
        .list_batches(status, params.limit, params.offset)
        .await?;
    let data: Vec<BatchDto> = batches.into_iter().map(BatchDto::from).collect();
    let count = data.len() as i64;

    Ok(Json(BatchListResponse {
        data,
        pagination: PageMeta {
            limit: params.limit,
            offset: params.offset,
            count,
        },
    }))
}

/// `GET /stats` — Aggregate payout and risk reserve figures.
///
/// # Errors
///
/// Returns [`SettlementError::PersistenceError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Payouts",
    summary = "Get payout statistics",
    description = "Returns batch counts and amounts, pending payable and held totals, and the current risk reserve balance.",
    responses(
        (status = 200, description = "Aggregate figures", body = StatsResponse),
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, SettlementError> {
    let (payouts, risk_pool_balance) = state.settlement.stats().await?;
    Ok(Json(StatsResponse::new(payouts, risk_pool_balance)))
}

/// Payout batch routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/batches", post(create_batch).get(list_batches))
        .route("/batches/{id}", get(get_batch))
        .route("/batches/{id}/confirm", post(confirm_batch))
        .route("/stats", get(get_stats))
}
