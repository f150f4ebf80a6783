//! Settlement event endpoints: ingest, fetch, preview calculation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AllocationDto, CreateEventRequest, CreateEventResponse, EventResponse};
use crate::app_state::AppState;
use crate::domain::EventId;
use crate::error::{ErrorResponse, SettlementError};

/// `POST /events` — Record a settlement event.
///
/// # Errors
///
/// Returns [`SettlementError`] on validation failure, an unknown or
/// already-reversed original event, or when ingest is toggled off.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Record a settlement event",
    description = "Ingests a forward PAYMENT or a reversal (REFUND, CHARGEBACK, FEE_ADJUSTED), computes the full allocation, and persists the event with its ledger rows atomically. A repeated PAYMENT idempotency key replays the stored event with `replayed: true`.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event recorded (or replayed under an idempotency key)", body = CreateEventResponse),
        (status = 400, description = "Invalid request or event type", body = ErrorResponse),
        (status = 404, description = "Original event not found", body = ErrorResponse),
        (status = 409, description = "Duplicate reversal for the original event", body = ErrorResponse),
        (status = 422, description = "Invalid reversal amount", body = ErrorResponse),
        (status = 503, description = "Ingest is toggled off", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let toggles = state.toggles.snapshot();
    let outcome = state.settlement.ingest(req.into(), toggles).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse::from(&outcome)),
    ))
}

/// `GET /events/:id` — Fetch a stored settlement event.
///
/// # Errors
///
/// Returns [`SettlementError::EventNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get a settlement event",
    description = "Returns the stored event with all derived amounts. Reversal events carry negative derived amounts and reference their original payment.",
    params(
        ("id" = uuid::Uuid, Path, description = "Settlement event UUID"),
    ),
    responses(
        (status = 200, description = "Stored event", body = EventResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let event = state.settlement.get_event(EventId::from_uuid(id)).await?;
    Ok(Json(EventResponse::from(event)))
}

/// `POST /calculate` — Preview an allocation without persisting.
///
/// # Errors
///
/// Returns [`SettlementError`] on validation failure or an unknown
/// original event.
#[utoipa::path(
    post,
    path = "/api/v1/calculate",
    tag = "Events",
    summary = "Preview a settlement calculation",
    description = "Runs the full allocation calculation for the given request and returns the complete breakdown. Nothing is persisted; reversal previews resolve the original payment but skip the duplicate check.",
    request_body = CreateEventRequest,
    responses(
        (status = 200, description = "Computed allocation", body = AllocationDto),
        (status = 400, description = "Invalid request or event type", body = ErrorResponse),
        (status = 404, description = "Original event not found", body = ErrorResponse),
        (status = 422, description = "Invalid reversal amount", body = ErrorResponse),
    )
)]
pub async fn calculate_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let allocation = state.settlement.preview(req.into()).await?;
    Ok(Json(AllocationDto::from(&allocation)))
}

/// Settlement event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{id}", get(get_event))
        .route("/calculate", post(calculate_event))
}
