//! Settlement event types: the immutable record of one financial occurrence.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CreatorId, EventId};
use crate::error::SettlementError;

/// Classification of a settlement event.
///
/// `Payment` is the forward direction; the other three are reversal types
/// that undo (part of) a previously recorded payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A buyer paid for an artifact.
    Payment,
    /// A voluntary refund of a payment.
    Refund,
    /// A payment-processor chargeback against a payment.
    Chargeback,
    /// A retroactive fee adjustment against a payment.
    FeeAdjusted,
}

impl EventType {
    /// Returns the wire-format name (`"PAYMENT"`, `"REFUND"`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Refund => "REFUND",
            Self::Chargeback => "CHARGEBACK",
            Self::FeeAdjusted => "FEE_ADJUSTED",
        }
    }

    /// True for the reversal types (`REFUND`, `CHARGEBACK`, `FEE_ADJUSTED`).
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        !matches!(self, Self::Payment)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(Self::Payment),
            "REFUND" => Ok(Self::Refund),
            "CHARGEBACK" => Ok(Self::Chargeback),
            "FEE_ADJUSTED" => Ok(Self::FeeAdjusted),
            other => Err(SettlementError::InvalidEventType(other.to_string())),
        }
    }
}

/// Input for recording a new settlement event.
///
/// Assembled by the HTTP boundary from the request body; the service layer
/// validates it, runs the calculation, and persists the resulting
/// [`SettlementEvent`]. The `event_type` stays a raw string here so the
/// service owns the `InvalidEventType` rejection.
#[derive(Debug, Clone)]
pub struct NewSettlementEvent {
    /// Raw event type string (`"PAYMENT"`, `"REFUND"`, ...).
    pub event_type: String,
    /// Gross transaction amount in minor currency units (must be > 0).
    pub gross_amount: i64,
    /// Coupon discount in minor units (`0 <= coupon <= gross`).
    pub coupon_amount: i64,
    /// Upstream creators of remixed content, outermost first. Unbounded at
    /// input; truncated to the remix depth cap at calculation time.
    pub remix_chain: Vec<CreatorId>,
    /// Referrer credited with this sale, if any.
    pub referrer_id: Option<CreatorId>,
    /// Creator of the root (original) artifact.
    pub creator_root_id: Option<CreatorId>,
    /// Template the sold artifact was built from.
    pub template_id: Option<String>,
    /// The sold artifact.
    pub artifact_id: Option<String>,
    /// Buyer account, if known.
    pub buyer_user_id: Option<String>,
    /// The PAYMENT being reversed. Required for reversal types.
    pub original_event_id: Option<EventId>,
    /// Partial reversal amount in minor units. `None` reverses the full
    /// original paid amount. Ignored for `PAYMENT`.
    pub reversal_amount: Option<i64>,
    /// Caller-supplied key for at-most-once PAYMENT ingestion under retry.
    pub idempotency_key: Option<String>,
    /// When the event occurred. Defaults to ingestion time.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Immutable record of one financial occurrence, with derived amounts.
///
/// Never mutated after creation: corrections are new reversal events, not
/// edits. For reversal events the derived amounts (`paid_amount`, `pg_fee`,
/// `net_cash`, `anchor_amount`) carry the scaled, negated values and
/// `gross_amount`/`coupon_amount`/`remix_chain`/`referrer_id` echo the
/// original payment's parameters the reversal was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementEvent {
    /// Unique event identifier, generated at ingestion.
    pub event_id: EventId,
    /// Event classification.
    pub event_type: EventType,
    /// Gross transaction amount in minor units.
    pub gross_amount: i64,
    /// Coupon discount in minor units.
    pub coupon_amount: i64,
    /// Amount the buyer actually paid (`gross - coupon`); negative for
    /// reversals.
    pub paid_amount: i64,
    /// Payment-processor fee at the fixed rate; negative for reversals.
    pub pg_fee: i64,
    /// Cash actually received (`paid - fee`); negative for reversals.
    pub net_cash: i64,
    /// Pool-split base (`gross - fee`); negative for reversals.
    pub anchor_amount: i64,
    /// Remix chain as used by the calculation (truncated to the depth cap).
    pub remix_chain: Vec<CreatorId>,
    /// Referrer credited with this sale, if any.
    pub referrer_id: Option<CreatorId>,
    /// Creator of the root artifact.
    pub creator_root_id: Option<CreatorId>,
    /// Template linkage.
    pub template_id: Option<String>,
    /// Artifact linkage.
    pub artifact_id: Option<String>,
    /// Buyer linkage.
    pub buyer_user_id: Option<String>,
    /// The PAYMENT this event reverses, for reversal types.
    pub original_event_id: Option<EventId>,
    /// Effective reversed amount in minor units (positive magnitude), for
    /// reversal types.
    pub reversal_amount: Option<i64>,
    /// Idempotency key the event was recorded under, if any.
    pub idempotency_key: Option<String>,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the engine recorded the event.
    pub created_at: DateTime<Utc>,
}
