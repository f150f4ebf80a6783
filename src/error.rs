//! Engine error types with HTTP status code mapping.
//!
//! [`SettlementError`] is the central error type for the engine. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: gross_amount must be positive",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the code-range table on [`SettlementError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                  |
/// |-----------|-------------------|------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request              |
/// | 2000–2999 | Lookup/Conflict   | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server/Operations | 500 / 503                    |
/// | 4000–4999 | Settlement Rules  | 422 Unprocessable Entity     |
///
/// `BalanceInvariantViolation` carries the dedicated code 3100 so that
/// monitoring can alarm on it separately from ordinary server errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported or malformed settlement event type string.
    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    /// Settlement event with the given ID was not found.
    #[error("settlement event not found: {0}")]
    EventNotFound(uuid::Uuid),

    /// Payout batch with the given ID was not found.
    #[error("payout batch not found: {0}")]
    BatchNotFound(uuid::Uuid),

    /// A reversal of this type was already recorded for the original event.
    #[error("duplicate reversal for event {original_event_id} ({event_type})")]
    DuplicateReversal {
        /// The PAYMENT event the rejected reversal referenced.
        original_event_id: uuid::Uuid,
        /// Reversal event type already on record.
        event_type: String,
    },

    /// Reversal amount is non-positive or exceeds the original paid amount.
    #[error("invalid reversal amount: {requested} (original paid {original_paid})")]
    InvalidReversalAmount {
        /// Requested reversal amount in minor units.
        requested: i64,
        /// Paid amount of the original event in minor units.
        original_paid: i64,
    },

    /// Batch creation found no payable creator shares to aggregate.
    #[error("no payable shares eligible for payout batch")]
    NoPayableShares,

    /// The computed allocation failed exact balance conservation.
    ///
    /// This is an internal defect, never a client error; nothing is
    /// persisted when it fires.
    #[error("balance invariant violated: diff {diff}")]
    BalanceInvariantViolation {
        /// `net_cash - (platform_actual + creator + growth + risk)`; must be 0.
        diff: i64,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// A required backing service is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The operation is switched off by a runtime feature toggle.
    #[error("feature disabled: {0}")]
    ToggleDisabled(&'static str),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidEventType(_) => 1002,
            Self::EventNotFound(_) => 2001,
            Self::BatchNotFound(_) => 2002,
            Self::DuplicateReversal { .. } => 2003,
            Self::InvalidReversalAmount { .. } => 4001,
            Self::NoPayableShares => 4002,
            Self::BalanceInvariantViolation { .. } => 3100,
            Self::PersistenceError(_) => 3001,
            Self::ServiceUnavailable(_) => 3002,
            Self::ToggleDisabled(_) => 3003,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidEventType(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound(_) | Self::BatchNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateReversal { .. } => StatusCode::CONFLICT,
            Self::InvalidReversalAmount { .. } | Self::NoPayableShares => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::BalanceInvariantViolation { .. }
            | Self::PersistenceError(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) | Self::ToggleDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
