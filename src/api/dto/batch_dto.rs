//! Payout batch DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common_dto::PageMeta;
use crate::domain::{BatchDetail, PayoutBatch, PayoutStats};

/// Request body for `POST /batches`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    /// Eligibility cutoff: claim payable shares created at or before this
    /// instant. Defaults to now.
    #[serde(default)]
    pub batch_date: Option<DateTime<Utc>>,
}

/// One payout batch.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchDto {
    /// Unique batch identifier.
    pub batch_id: Uuid,
    /// Eligibility cutoff the batch claimed shares against.
    pub batch_date: DateTime<Utc>,
    /// Lifecycle status: `"draft"` or `"confirmed"`.
    pub status: String,
    /// Sum of claimed share amounts in minor units.
    pub total_amount: i64,
    /// Number of claimed shares.
    pub share_count: i64,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch was confirmed, once terminal.
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<PayoutBatch> for BatchDto {
    fn from(batch: PayoutBatch) -> Self {
        Self {
            batch_id: Uuid::from(batch.batch_id),
            batch_date: batch.batch_date,
            status: batch.status.to_string(),
            total_amount: batch.total_amount,
            share_count: batch.share_count,
            created_at: batch.created_at,
            confirmed_at: batch.confirmed_at,
        }
    }
}

/// Batch detail with claimed share ids, for `POST /batches` and
/// `GET /batches/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchDetailResponse {
    /// The batch record.
    pub batch: BatchDto,
    /// Ids of the creator shares this batch claimed.
    pub share_ids: Vec<Uuid>,
}

impl From<BatchDetail> for BatchDetailResponse {
    fn from(detail: BatchDetail) -> Self {
        Self {
            batch: BatchDto::from(detail.batch),
            share_ids: detail.share_ids.into_iter().map(Uuid::from).collect(),
        }
    }
}

/// Paginated list response for `GET /batches`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchListResponse {
    /// Batches, newest first.
    pub data: Vec<BatchDto>,
    /// Pagination echo.
    pub pagination: PageMeta,
}

/// Aggregate payout and risk figures for `GET /stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of batches ever created.
    pub total_batches: i64,
    /// Batches still in `draft`.
    pub draft_batches: i64,
    /// Batches confirmed.
    pub confirmed_batches: i64,
    /// Sum of claimed amounts over confirmed batches.
    pub confirmed_amount: i64,
    /// Sum over currently payable, unclaimed creator shares.
    pub payable_amount: i64,
    /// Sum over currently held creator shares.
    pub held_amount: i64,
    /// Current risk reserve balance (sum of the append-only ledger).
    pub risk_pool_balance: i64,
}

impl StatsResponse {
    /// Combines payout stats with the risk reserve balance.
    #[must_use]
    pub const fn new(payouts: PayoutStats, risk_pool_balance: i64) -> Self {
        Self {
            total_batches: payouts.total_batches,
            draft_batches: payouts.draft_batches,
            confirmed_batches: payouts.confirmed_batches,
            confirmed_amount: payouts.confirmed_amount,
            payable_amount: payouts.payable_amount,
            held_amount: payouts.held_amount,
            risk_pool_balance,
        }
    }
}
