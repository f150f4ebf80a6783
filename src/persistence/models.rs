//! Database row models for the settlement tables.
//!
//! Thin mirrors of the table columns, converted into domain types with
//! [`TryFrom`]; a value the domain enums refuse to parse means a corrupt
//! row and surfaces as a persistence error, never as a client error.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    BatchId, BatchStatus, CreatorHistoryEntry, CreatorId, CreatorShare, EventId, EventType,
    PayoutBatch, SettlementEvent, ShareChannel, ShareId, ShareStatus,
};
use crate::error::SettlementError;

/// A stored settlement event row from `settlement_events`.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    /// Event primary key.
    pub event_id: Uuid,
    /// Event type discriminator.
    pub event_type: String,
    /// Gross amount in minor units.
    pub gross_amount: i64,
    /// Coupon amount in minor units.
    pub coupon_amount: i64,
    /// Derived paid amount.
    pub paid_amount: i64,
    /// Derived processor fee.
    pub pg_fee: i64,
    /// Derived net cash.
    pub net_cash: i64,
    /// Derived anchor amount.
    pub anchor_amount: i64,
    /// Truncated remix chain.
    pub remix_chain: Vec<String>,
    /// Referrer linkage.
    pub referrer_id: Option<String>,
    /// Root creator linkage.
    pub creator_root_id: Option<String>,
    /// Template linkage.
    pub template_id: Option<String>,
    /// Artifact linkage.
    pub artifact_id: Option<String>,
    /// Buyer linkage.
    pub buyer_user_id: Option<String>,
    /// Reversed original event, for reversal rows.
    pub original_event_id: Option<Uuid>,
    /// Effective reversed amount, for reversal rows.
    pub reversal_amount: Option<i64>,
    /// Idempotency key the event was recorded under.
    pub idempotency_key: Option<String>,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for SettlementEvent {
    type Error = SettlementError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = EventType::from_str(&row.event_type).map_err(|_| {
            SettlementError::PersistenceError(format!(
                "unknown event type in store: {}",
                row.event_type
            ))
        })?;
        Ok(Self {
            event_id: EventId::from_uuid(row.event_id),
            event_type,
            gross_amount: row.gross_amount,
            coupon_amount: row.coupon_amount,
            paid_amount: row.paid_amount,
            pg_fee: row.pg_fee,
            net_cash: row.net_cash,
            anchor_amount: row.anchor_amount,
            remix_chain: row.remix_chain.into_iter().map(CreatorId::from).collect(),
            referrer_id: row.referrer_id.map(CreatorId::from),
            creator_root_id: row.creator_root_id.map(CreatorId::from),
            template_id: row.template_id,
            artifact_id: row.artifact_id,
            buyer_user_id: row.buyer_user_id,
            original_event_id: row.original_event_id.map(EventId::from_uuid),
            reversal_amount: row.reversal_amount,
            idempotency_key: row.idempotency_key,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
        })
    }
}

/// A creator share row from `creator_shares`.
#[derive(Debug, Clone, FromRow)]
pub struct CreatorShareRow {
    /// Share primary key.
    pub share_id: Uuid,
    /// Originating event.
    pub event_id: Uuid,
    /// Payee.
    pub creator_id: String,
    /// Creator-pool channel.
    pub channel: String,
    /// Remix-chain depth, for remix shares.
    pub remix_depth: Option<i16>,
    /// Signed amount in minor units.
    pub amount: i64,
    /// Lifecycle status.
    pub status: String,
    /// Hold-queue expiry.
    pub hold_until: Option<DateTime<Utc>>,
    /// Claiming payout batch, if any.
    pub batch_id: Option<Uuid>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CreatorShareRow> for CreatorShare {
    type Error = SettlementError;

    fn try_from(row: CreatorShareRow) -> Result<Self, Self::Error> {
        Ok(Self {
            share_id: ShareId::from_uuid(row.share_id),
            event_id: EventId::from_uuid(row.event_id),
            creator_id: CreatorId::from(row.creator_id),
            channel: ShareChannel::from_str(&row.channel)?,
            remix_depth: row.remix_depth,
            amount: row.amount,
            status: ShareStatus::from_str(&row.status)?,
            hold_until: row.hold_until,
            batch_id: row.batch_id.map(BatchId::from_uuid),
            created_at: row.created_at,
        })
    }
}

/// A payout batch row from `payout_batches`.
#[derive(Debug, Clone, FromRow)]
pub struct BatchRow {
    /// Batch primary key.
    pub batch_id: Uuid,
    /// Eligibility cutoff.
    pub batch_date: DateTime<Utc>,
    /// Lifecycle status.
    pub status: String,
    /// Sum of claimed share amounts.
    pub total_amount: i64,
    /// Number of claimed shares.
    pub share_count: i64,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch was confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for PayoutBatch {
    type Error = SettlementError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            batch_id: BatchId::from_uuid(row.batch_id),
            batch_date: row.batch_date,
            status: BatchStatus::from_str(&row.status)?,
            total_amount: row.total_amount,
            share_count: row.share_count,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
        })
    }
}

/// A creator share joined with its event context, for history reads.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    /// The share columns.
    #[sqlx(flatten)]
    pub share: CreatorShareRow,
    /// Event type of the originating event.
    pub event_type: String,
    /// Gross amount of the originating event.
    pub gross_amount: i64,
    /// Artifact linkage of the originating event.
    pub artifact_id: Option<String>,
    /// When the originating event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for CreatorHistoryEntry {
    type Error = SettlementError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let event_type = EventType::from_str(&row.event_type).map_err(|_| {
            SettlementError::PersistenceError(format!(
                "unknown event type in store: {}",
                row.event_type
            ))
        })?;
        Ok(Self {
            share: CreatorShare::try_from(row.share)?,
            event_type,
            gross_amount: row.gross_amount,
            artifact_id: row.artifact_id,
            occurred_at: row.occurred_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_row_converts_to_domain() {
        let row = EventRow {
            event_id: Uuid::new_v4(),
            event_type: "PAYMENT".to_string(),
            gross_amount: 10_000,
            coupon_amount: 0,
            paid_amount: 10_000,
            pg_fee: 350,
            net_cash: 9_650,
            anchor_amount: 9_650,
            remix_chain: vec!["p1".to_string()],
            referrer_id: Some("ref_1".to_string()),
            creator_root_id: None,
            template_id: None,
            artifact_id: None,
            buyer_user_id: None,
            original_event_id: None,
            reversal_amount: None,
            idempotency_key: Some("key-1".to_string()),
            occurred_at: Utc::now(),
            created_at: Utc::now(),
        };
        let Ok(event) = SettlementEvent::try_from(row) else {
            panic!("conversion should succeed");
        };
        assert_eq!(event.event_type, EventType::Payment);
        assert_eq!(event.remix_chain, vec![CreatorId::from("p1")]);
        assert_eq!(event.referrer_id, Some(CreatorId::from("ref_1")));
    }

    #[test]
    fn corrupt_event_type_is_a_persistence_error() {
        let row = EventRow {
            event_id: Uuid::new_v4(),
            event_type: "payment".to_string(),
            gross_amount: 0,
            coupon_amount: 0,
            paid_amount: 0,
            pg_fee: 0,
            net_cash: 0,
            anchor_amount: 0,
            remix_chain: vec![],
            referrer_id: None,
            creator_root_id: None,
            template_id: None,
            artifact_id: None,
            buyer_user_id: None,
            original_event_id: None,
            reversal_amount: None,
            idempotency_key: None,
            occurred_at: Utc::now(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            SettlementEvent::try_from(row),
            Err(SettlementError::PersistenceError(_))
        ));
    }

    #[test]
    fn share_row_converts_status_and_channel() {
        let row = CreatorShareRow {
            share_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            creator_id: "creator_a".to_string(),
            channel: "remix".to_string(),
            remix_depth: Some(2),
            amount: 193,
            status: "held".to_string(),
            hold_until: Some(Utc::now()),
            batch_id: None,
            created_at: Utc::now(),
        };
        let Ok(share) = CreatorShare::try_from(row) else {
            panic!("conversion should succeed");
        };
        assert_eq!(share.channel, ShareChannel::Remix);
        assert_eq!(share.status, ShareStatus::Held);
        assert_eq!(share.remix_depth, Some(2));
    }
}
