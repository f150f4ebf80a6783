//! Payout batch lifecycle types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BatchId, ShareId};
use crate::error::SettlementError;

/// Payout batch state machine: `Draft → Confirmed`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created and holding claimed shares; not yet paid out.
    Draft,
    /// Paid out; every claimed share is `paid`. Terminal.
    Confirmed,
}

impl BatchStatus {
    /// Returns the wire/database name (`"draft"`, `"confirmed"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(SettlementError::PersistenceError(format!(
                "unknown batch status: {other}"
            ))),
        }
    }
}

/// A dated aggregation of payable creator shares confirmed together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutBatch {
    /// Unique batch identifier.
    pub batch_id: BatchId,
    /// Eligibility cutoff: the batch claimed payable shares created at or
    /// before this instant.
    pub batch_date: DateTime<Utc>,
    /// Lifecycle status.
    pub status: BatchStatus,
    /// Sum of claimed share amounts in minor units.
    pub total_amount: i64,
    /// Number of claimed shares.
    pub share_count: i64,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch was confirmed, once terminal.
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// A batch together with the ids of the shares it claimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchDetail {
    /// The batch record.
    pub batch: PayoutBatch,
    /// Ids of the creator shares this batch claimed.
    pub share_ids: Vec<ShareId>,
}

/// Aggregate payout figures across all batches plus pending amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayoutStats {
    /// Number of batches ever created.
    pub total_batches: i64,
    /// Batches still in `draft`.
    pub draft_batches: i64,
    /// Batches confirmed.
    pub confirmed_batches: i64,
    /// Sum of `total_amount` over confirmed batches.
    pub confirmed_amount: i64,
    /// Sum over currently `payable` creator shares (unclaimed).
    pub payable_amount: i64,
    /// Sum over currently `held` creator shares.
    pub held_amount: i64,
}
