//! Distribution-ledger rows: creator shares, growth shares, risk entries.
//!
//! The ledger owns creation of these rows exclusively; the payout batch
//! manager owns the `payable → paid` transition exclusively. Nothing else
//! mutates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BatchId, CreatorId, EventId, EventType, ShareId};
use crate::error::SettlementError;

/// Which slice of the creator pool a share was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareChannel {
    /// The root creator's slice.
    Original,
    /// A remix-chain slice.
    Remix,
    /// The curation slice.
    Curation,
}

impl ShareChannel {
    /// Returns the wire/database name (`"original"`, `"remix"`,
    /// `"curation"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Remix => "remix",
            Self::Curation => "curation",
        }
    }
}

impl fmt::Display for ShareChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareChannel {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "remix" => Ok(Self::Remix),
            "curation" => Ok(Self::Curation),
            other => Err(SettlementError::PersistenceError(format!(
                "unknown share channel: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a share.
///
/// `Held → Payable → Paid`, strictly one-way. Shares created for reversal
/// events skip `Held`; `Paid` is reachable only through batch confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    /// Waiting out the review window; not yet eligible for payout.
    Held,
    /// Eligible for the next payout batch.
    Payable,
    /// Included in a confirmed payout batch. Terminal.
    Paid,
}

impl ShareStatus {
    /// Returns the wire/database name (`"held"`, `"payable"`, `"paid"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Payable => "payable",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for ShareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "held" => Ok(Self::Held),
            "payable" => Ok(Self::Payable),
            "paid" => Ok(Self::Paid),
            other => Err(SettlementError::PersistenceError(format!(
                "unknown share status: {other}"
            ))),
        }
    }
}

/// One payee's share of one settlement event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorShare {
    /// Unique share identifier.
    pub share_id: ShareId,
    /// The settlement event this share was cut from.
    pub event_id: EventId,
    /// The payee.
    pub creator_id: CreatorId,
    /// Which creator-pool slice the share came from.
    pub channel: ShareChannel,
    /// Remix-chain position for `remix` shares (1..=3), else `None`.
    pub remix_depth: Option<i16>,
    /// Share amount in minor units; negative for reversal clawbacks.
    pub amount: i64,
    /// Lifecycle status.
    pub status: ShareStatus,
    /// When a `held` share becomes eligible for release.
    pub hold_until: Option<DateTime<Utc>>,
    /// The payout batch that claimed this share, if any. A share belongs
    /// to at most one batch ever.
    pub batch_id: Option<BatchId>,
    /// When the ledger created this row.
    pub created_at: DateTime<Utc>,
}

impl CreatorShare {
    /// Creates a new unclaimed share row.
    #[must_use]
    pub fn new(
        event_id: EventId,
        creator_id: CreatorId,
        channel: ShareChannel,
        remix_depth: Option<i16>,
        amount: i64,
        status: ShareStatus,
        hold_until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            share_id: ShareId::new(),
            event_id,
            creator_id,
            channel,
            remix_depth,
            amount,
            status,
            hold_until,
            batch_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Growth-pool bucket a growth share belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthBucket {
    /// Referral credit.
    Referrer,
    /// Campaign budget.
    Campaign,
    /// Unattributed reserve.
    Reserve,
}

impl GrowthBucket {
    /// Returns the wire/database name (`"referrer"`, `"campaign"`,
    /// `"reserve"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Referrer => "referrer",
            Self::Campaign => "campaign",
            Self::Reserve => "reserve",
        }
    }
}

impl fmt::Display for GrowthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrowthBucket {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referrer" => Ok(Self::Referrer),
            "campaign" => Ok(Self::Campaign),
            "reserve" => Ok(Self::Reserve),
            other => Err(SettlementError::PersistenceError(format!(
                "unknown growth bucket: {other}"
            ))),
        }
    }
}

/// One growth-pool bucket's share of one settlement event.
///
/// Same status lifecycle as [`CreatorShare`], but keyed by bucket instead
/// of payee and never claimed by payout batches (growth funds leave the
/// system through a separate channel).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthShare {
    /// Unique share identifier.
    pub share_id: ShareId,
    /// The settlement event this share was cut from.
    pub event_id: EventId,
    /// Which growth-pool bucket.
    pub bucket: GrowthBucket,
    /// The credited referrer, for `referrer` bucket rows.
    pub referrer_id: Option<CreatorId>,
    /// Share amount in minor units; negative on reversals.
    pub amount: i64,
    /// Lifecycle status.
    pub status: ShareStatus,
    /// When a `held` share becomes eligible for release.
    pub hold_until: Option<DateTime<Utc>>,
    /// When the ledger created this row.
    pub created_at: DateTime<Utc>,
}

impl GrowthShare {
    /// Creates a new growth share row.
    #[must_use]
    pub fn new(
        event_id: EventId,
        bucket: GrowthBucket,
        referrer_id: Option<CreatorId>,
        amount: i64,
        status: ShareStatus,
        hold_until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            share_id: ShareId::new(),
            event_id,
            bucket,
            referrer_id,
            amount,
            status,
            hold_until,
            created_at: Utc::now(),
        }
    }
}

/// Append-only risk reserve movement.
///
/// The reserve balance is always `SUM(amount)` over these entries at read
/// time, never a stored counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLedgerEntry {
    /// The settlement event that moved the reserve.
    pub event_id: EventId,
    /// The event's type (deposits come from payments, withdrawals from
    /// reversals).
    pub event_type: EventType,
    /// Signed movement in minor units.
    pub amount: i64,
    /// When the ledger appended this entry.
    pub created_at: DateTime<Utc>,
}

/// Aggregated settlement position of one creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorSummary {
    /// The creator.
    pub creator_id: CreatorId,
    /// Sum over all shares, any status.
    pub total_amount: i64,
    /// Sum over `held` shares.
    pub held_amount: i64,
    /// Sum over `payable` shares.
    pub payable_amount: i64,
    /// Sum over `paid` shares.
    pub paid_amount: i64,
    /// Sum over `original`-channel shares.
    pub original_amount: i64,
    /// Sum over `remix`-channel shares.
    pub remix_amount: i64,
    /// Sum over `curation`-channel shares.
    pub curation_amount: i64,
    /// Number of share rows.
    pub share_count: i64,
}

/// One creator share joined with its settlement-event context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorHistoryEntry {
    /// The share row.
    pub share: CreatorShare,
    /// Type of the originating event.
    pub event_type: EventType,
    /// Gross amount of the originating event.
    pub gross_amount: i64,
    /// Artifact sold by the originating event, if recorded.
    pub artifact_id: Option<String>,
    /// When the originating event occurred.
    pub occurred_at: DateTime<Utc>,
}

/// Aggregated growth position of one referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferrerSummary {
    /// The referrer.
    pub referrer_id: CreatorId,
    /// Sum over all referrer-bucket shares, any status.
    pub total_amount: i64,
    /// Sum over `held` shares.
    pub held_amount: i64,
    /// Sum over `payable` shares.
    pub payable_amount: i64,
    /// Sum over `paid` shares.
    pub paid_amount: i64,
    /// Number of referred settlement events.
    pub event_count: i64,
}

/// Result of a hold-queue release pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseOutcome {
    /// Creator shares flipped `held → payable` in this pass.
    pub creator_shares: Vec<CreatorShare>,
    /// Number of growth shares flipped in the same pass.
    pub growth_released: u64,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_and_channel_parse_their_wire_names() {
        for status in [ShareStatus::Held, ShareStatus::Payable, ShareStatus::Paid] {
            let Ok(parsed) = ShareStatus::from_str(status.as_str()) else {
                panic!("status should parse");
            };
            assert_eq!(parsed, status);
        }
        for channel in [
            ShareChannel::Original,
            ShareChannel::Remix,
            ShareChannel::Curation,
        ] {
            let Ok(parsed) = ShareChannel::from_str(channel.as_str()) else {
                panic!("channel should parse");
            };
            assert_eq!(parsed, channel);
        }
        for bucket in [
            GrowthBucket::Referrer,
            GrowthBucket::Campaign,
            GrowthBucket::Reserve,
        ] {
            let Ok(parsed) = GrowthBucket::from_str(bucket.as_str()) else {
                panic!("bucket should parse");
            };
            assert_eq!(parsed, bucket);
        }
    }

    #[test]
    fn unknown_status_maps_to_persistence_error() {
        let Err(SettlementError::PersistenceError(msg)) = ShareStatus::from_str("pending") else {
            panic!("expected PersistenceError");
        };
        assert!(msg.contains("pending"));
    }

    #[test]
    fn new_share_starts_unclaimed() {
        let share = CreatorShare::new(
            EventId::new(),
            CreatorId::from("creator_a"),
            ShareChannel::Original,
            None,
            2_027,
            ShareStatus::Payable,
            None,
        );
        assert!(share.batch_id.is_none());
        assert_eq!(share.status, ShareStatus::Payable);
        assert_eq!(share.amount, 2_027);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ShareStatus::Payable).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"payable\"");
    }
}
