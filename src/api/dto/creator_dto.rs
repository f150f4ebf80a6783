//! Creator, referrer, and share-ledger DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common_dto::PageMeta;
use crate::domain::{
    CreatorHistoryEntry, CreatorShare, CreatorSummary, ReferrerSummary, ReleaseOutcome,
};

/// Aggregated settlement position of one creator, for `GET /creators/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatorSummaryResponse {
    /// The creator.
    pub creator_id: String,
    /// Sum over all shares, any status.
    pub total_amount: i64,
    /// Sum over held shares.
    pub held_amount: i64,
    /// Sum over payable shares.
    pub payable_amount: i64,
    /// Sum over paid shares.
    pub paid_amount: i64,
    /// Sum over original-channel shares.
    pub original_amount: i64,
    /// Sum over remix-channel shares.
    pub remix_amount: i64,
    /// Sum over curation-channel shares.
    pub curation_amount: i64,
    /// Number of share rows.
    pub share_count: i64,
}

impl From<CreatorSummary> for CreatorSummaryResponse {
    fn from(summary: CreatorSummary) -> Self {
        Self {
            creator_id: summary.creator_id.to_string(),
            total_amount: summary.total_amount,
            held_amount: summary.held_amount,
            payable_amount: summary.payable_amount,
            paid_amount: summary.paid_amount,
            original_amount: summary.original_amount,
            remix_amount: summary.remix_amount,
            curation_amount: summary.curation_amount,
            share_count: summary.share_count,
        }
    }
}

/// One creator share row.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareDto {
    /// Unique share identifier.
    pub share_id: Uuid,
    /// The settlement event this share was cut from.
    pub event_id: Uuid,
    /// The payee.
    pub creator_id: String,
    /// Creator-pool channel: `"original"`, `"remix"`, or `"curation"`.
    pub channel: String,
    /// Remix-chain position for remix shares.
    pub remix_depth: Option<i16>,
    /// Share amount in minor units; negative for reversal clawbacks.
    pub amount: i64,
    /// Lifecycle status: `"held"`, `"payable"`, or `"paid"`.
    pub status: String,
    /// When a held share becomes eligible for release.
    pub hold_until: Option<DateTime<Utc>>,
    /// The payout batch that claimed this share, if any.
    pub batch_id: Option<Uuid>,
    /// When the ledger created this row.
    pub created_at: DateTime<Utc>,
}

impl From<CreatorShare> for ShareDto {
    fn from(share: CreatorShare) -> Self {
        Self {
            share_id: Uuid::from(share.share_id),
            event_id: Uuid::from(share.event_id),
            creator_id: share.creator_id.to_string(),
            channel: share.channel.to_string(),
            remix_depth: share.remix_depth,
            amount: share.amount,
            status: share.status.to_string(),
            hold_until: share.hold_until,
            batch_id: share.batch_id.map(Uuid::from),
            created_at: share.created_at,
        }
    }
}

/// One share with its settlement-event context, for
/// `GET /creators/{id}/history`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryDto {
    /// The share row.
    pub share: ShareDto,
    /// Type of the originating event.
    pub event_type: String,
    /// Gross amount of the originating event.
    pub gross_amount: i64,
    /// Artifact sold by the originating event, if recorded.
    pub artifact_id: Option<String>,
    /// When the originating event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl From<CreatorHistoryEntry> for HistoryEntryDto {
    fn from(entry: CreatorHistoryEntry) -> Self {
        Self {
            share: ShareDto::from(entry.share),
            event_type: entry.event_type.to_string(),
            gross_amount: entry.gross_amount,
            artifact_id: entry.artifact_id,
            occurred_at: entry.occurred_at,
        }
    }
}

/// Paginated history response for `GET /creators/{id}/history`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// History entries, newest first.
    pub data: Vec<HistoryEntryDto>,
    /// Pagination echo.
    pub pagination: PageMeta,
}

/// Aggregated growth position of one referrer, for `GET /referrers/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReferrerSummaryResponse {
    /// The referrer.
    pub referrer_id: String,
    /// Sum over all referrer-bucket shares, any status.
    pub total_amount: i64,
    /// Sum over held shares.
    pub held_amount: i64,
    /// Sum over payable shares.
    pub payable_amount: i64,
    /// Sum over paid shares.
    pub paid_amount: i64,
    /// Number of referred settlement events.
    pub event_count: i64,
}

impl From<ReferrerSummary> for ReferrerSummaryResponse {
    fn from(summary: ReferrerSummary) -> Self {
        Self {
            referrer_id: summary.referrer_id.to_string(),
            total_amount: summary.total_amount,
            held_amount: summary.held_amount,
            payable_amount: summary.payable_amount,
            paid_amount: summary.paid_amount,
            event_count: summary.event_count,
        }
    }
}

/// Outcome of a hold-release pass, for `POST /shares/release`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReleaseResponse {
    /// Creator shares flipped `held -> payable`.
    pub creator_released: i64,
    /// Growth shares flipped in the same pass.
    pub growth_released: i64,
    /// Sum of the released creator share amounts in minor units.
    pub released_amount: i64,
}

impl From<ReleaseOutcome> for ReleaseResponse {
    fn from(outcome: ReleaseOutcome) -> Self {
        let released_amount = outcome.creator_shares.iter().map(|s| s.amount).sum();
        Self {
            creator_released: outcome.creator_shares.len() as i64,
            growth_released: outcome.growth_released as i64,
            released_amount,
        }
    }
}
