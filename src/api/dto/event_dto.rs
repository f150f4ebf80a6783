//! Settlement event and calculation DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Allocation, BalanceCheck, CreatorBreakdown, CreatorId, EventId, GrowthBreakdown,
    NewSettlementEvent, PoolSplit, RemixShare, ReversalRatio, SettlementEvent,
};
use crate::service::IngestOutcome;

/// Request body for `POST /events` and `POST /calculate`.
///
/// All amounts are integers in minor currency units. Reversal requests
/// (`REFUND`, `CHARGEBACK`, `FEE_ADJUSTED`) must set `original_event_id`
/// and quote the original payment's `gross_amount`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Event type: `"PAYMENT"`, `"REFUND"`, `"CHARGEBACK"`, or
    /// `"FEE_ADJUSTED"`.
    pub event_type: String,
    /// Gross transaction amount in minor units (must be > 0).
    pub gross_amount: i64,
    /// Coupon discount in minor units (`0 <= coupon <= gross`).
    #[serde(default)]
    pub coupon_amount: i64,
    /// Upstream creators of remixed content, outermost first.
    #[serde(default)]
    pub remix_chain: Vec<String>,
    /// Referrer credited with this sale.
    #[serde(default)]
    pub referrer_id: Option<String>,
    /// Creator of the root (original) artifact.
    #[serde(default)]
    pub creator_root_id: Option<String>,
    /// Template the sold artifact was built from.
    #[serde(default)]
    pub template_id: Option<String>,
    /// The sold artifact.
    #[serde(default)]
    pub artifact_id: Option<String>,
    /// Buyer account, if known.
    #[serde(default)]
    pub buyer_user_id: Option<String>,
    /// The PAYMENT being reversed. Required for reversal types.
    #[serde(default)]
    pub original_event_id: Option<Uuid>,
    /// Partial reversal amount in minor units. Omit to reverse the full
    /// original paid amount.
    #[serde(default)]
    pub reversal_amount: Option<i64>,
    /// Caller-supplied key for at-most-once PAYMENT ingestion under retry.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// When the event occurred (ISO-8601). Defaults to ingestion time.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl From<CreateEventRequest> for NewSettlementEvent {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            event_type: req.event_type,
            gross_amount: req.gross_amount,
            coupon_amount: req.coupon_amount,
            remix_chain: req.remix_chain.into_iter().map(CreatorId::from).collect(),
            referrer_id: req.referrer_id.map(CreatorId::from),
            creator_root_id: req.creator_root_id.map(CreatorId::from),
            template_id: req.template_id,
            artifact_id: req.artifact_id,
            buyer_user_id: req.buyer_user_id,
            original_event_id: req.original_event_id.map(EventId::from_uuid),
            reversal_amount: req.reversal_amount,
            idempotency_key: req.idempotency_key,
            occurred_at: req.occurred_at,
        }
    }
}

/// Top-level pool split figures.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolSplitDto {
    /// Platform take after remainder absorption.
    pub platform_actual: i64,
    /// Creator pool total.
    pub creator: i64,
    /// Growth pool total.
    pub growth: i64,
    /// Risk reserve movement.
    pub risk: i64,
}

impl From<PoolSplit> for PoolSplitDto {
    fn from(pools: PoolSplit) -> Self {
        Self {
            platform_actual: pools.platform_actual,
            creator: pools.creator,
            growth: pools.growth,
            risk: pools.risk,
        }
    }
}

/// Exact-conservation validation result.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceCheckDto {
    /// `net_cash - (platform_actual + creator + growth + risk)`; always 0
    /// for a persisted event.
    pub balance_diff: i64,
    /// True iff the allocation balanced exactly.
    pub balance_check: bool,
}

impl From<BalanceCheck> for BalanceCheckDto {
    fn from(validation: BalanceCheck) -> Self {
        Self {
            balance_diff: validation.balance_diff,
            balance_check: validation.balance_check,
        }
    }
}

/// One remix creator's slice of the remix sub-pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct RemixShareDto {
    /// The upstream creator receiving this slice.
    pub creator_id: String,
    /// Position in the remix chain, 1-based.
    pub depth: i16,
    /// Slice amount in minor units.
    pub amount: i64,
}

impl From<&RemixShare> for RemixShareDto {
    fn from(share: &RemixShare) -> Self {
        Self {
            creator_id: share.creator_id.to_string(),
            depth: share.depth,
            amount: share.amount,
        }
    }
}

/// Breakdown of the creator pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatorBreakdownDto {
    /// Original creator's slice.
    pub original: i64,
    /// Total set aside for the remix chain.
    pub remix_total: i64,
    /// Per-creator remix slices.
    pub remix_shares: Vec<RemixShareDto>,
    /// Curation slice.
    pub curation: i64,
}

impl From<&CreatorBreakdown> for CreatorBreakdownDto {
    fn from(breakdown: &CreatorBreakdown) -> Self {
        Self {
            original: breakdown.original,
            remix_total: breakdown.remix_total,
            remix_shares: breakdown.remix_shares.iter().map(RemixShareDto::from).collect(),
            curation: breakdown.curation,
        }
    }
}

/// Breakdown of the growth pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct GrowthBreakdownDto {
    /// Referrer credited, if any.
    pub referrer_id: Option<String>,
    /// Referrer slice in minor units.
    pub referrer: i64,
    /// Campaign slice.
    pub campaign: i64,
    /// Unattributed reserve slice.
    pub reserve: i64,
}

impl From<&GrowthBreakdown> for GrowthBreakdownDto {
    fn from(breakdown: &GrowthBreakdown) -> Self {
        Self {
            referrer_id: breakdown.referrer_id.as_ref().map(ToString::to_string),
            referrer: breakdown.referrer,
            campaign: breakdown.campaign,
            reserve: breakdown.reserve,
        }
    }
}

/// The reversal ratio applied to a scaled allocation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReversalRatioDto {
    /// Effective reversed amount in minor units.
    pub reversed_amount: i64,
    /// The original payment's paid amount.
    pub original_paid: i64,
}

impl From<ReversalRatio> for ReversalRatioDto {
    fn from(ratio: ReversalRatio) -> Self {
        Self {
            reversed_amount: ratio.reversed_amount,
            original_paid: ratio.original_paid,
        }
    }
}

/// Complete allocation, as returned by `POST /calculate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationDto {
    /// Gross amount the allocation was computed from.
    pub gross_amount: i64,
    /// Coupon amount the allocation was computed from.
    pub coupon_amount: i64,
    /// `gross - coupon`; scaled and negated on reversals.
    pub paid_amount: i64,
    /// Payment-processor fee.
    pub pg_fee: i64,
    /// `paid - fee`.
    pub net_cash: i64,
    /// Pool-split base (`gross - fee`).
    pub anchor_amount: i64,
    /// Top-level pool split.
    pub pools: PoolSplitDto,
    /// Creator pool breakdown.
    pub creator_breakdown: CreatorBreakdownDto,
    /// Growth pool breakdown.
    pub growth_breakdown: GrowthBreakdownDto,
    /// Exact-conservation validation result.
    pub validation: BalanceCheckDto,
    /// Present on reversal calculations: the applied scaling ratio.
    pub reversal: Option<ReversalRatioDto>,
}

impl From<&Allocation> for AllocationDto {
    fn from(allocation: &Allocation) -> Self {
        Self {
            gross_amount: allocation.gross_amount,
            coupon_amount: allocation.coupon_amount,
            paid_amount: allocation.paid_amount,
            pg_fee: allocation.pg_fee,
            net_cash: allocation.net_cash,
            anchor_amount: allocation.anchor_amount,
            pools: PoolSplitDto::from(allocation.pools),
            creator_breakdown: CreatorBreakdownDto::from(&allocation.creator_breakdown),
            growth_breakdown: GrowthBreakdownDto::from(&allocation.growth_breakdown),
            validation: BalanceCheckDto::from(allocation.validation),
            reversal: allocation.reversal.map(ReversalRatioDto::from),
        }
    }
}

/// Calculation summary embedded in the create-event response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CalculationSummaryDto {
    /// Gross amount the event was settled from.
    pub gross_amount: i64,
    /// Amount the buyer actually paid.
    pub paid_amount: i64,
    /// Cash actually received.
    pub net_cash: i64,
    /// Top-level pool split.
    pub pools: PoolSplitDto,
    /// Exact-conservation validation result.
    pub validation: BalanceCheckDto,
}

/// Response body for `POST /events` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateEventResponse {
    /// The recorded (or replayed) event's identifier.
    pub event_id: Uuid,
    /// Event type echoed from the request.
    pub event_type: String,
    /// True when an idempotency key matched a previously recorded event
    /// and nothing new was persisted.
    pub replayed: bool,
    /// Calculation summary for the event.
    pub calculation: CalculationSummaryDto,
}

impl From<&IngestOutcome> for CreateEventResponse {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            event_id: Uuid::from(outcome.event.event_id),
            event_type: outcome.event.event_type.to_string(),
            replayed: outcome.replayed,
            calculation: CalculationSummaryDto {
                gross_amount: outcome.allocation.gross_amount,
                paid_amount: outcome.allocation.paid_amount,
                net_cash: outcome.allocation.net_cash,
                pools: PoolSplitDto::from(outcome.allocation.pools),
                validation: BalanceCheckDto::from(outcome.allocation.validation),
            },
        }
    }
}

/// Stored settlement event for `GET /events/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type wire name.
    pub event_type: String,
    /// Gross transaction amount in minor units.
    pub gross_amount: i64,
    /// Coupon discount in minor units.
    pub coupon_amount: i64,
    /// Amount the buyer actually paid; negative for reversals.
    pub paid_amount: i64,
    /// Payment-processor fee; negative for reversals.
    pub pg_fee: i64,
    /// Cash actually received; negative for reversals.
    pub net_cash: i64,
    /// Pool-split base; negative for reversals.
    pub anchor_amount: i64,
    /// Remix chain as used by the calculation.
    pub remix_chain: Vec<String>,
    /// Referrer credited with the sale, if any.
    pub referrer_id: Option<String>,
    /// Creator of the root artifact.
    pub creator_root_id: Option<String>,
    /// Template linkage.
    pub template_id: Option<String>,
    /// Artifact linkage.
    pub artifact_id: Option<String>,
    /// Buyer linkage.
    pub buyer_user_id: Option<String>,
    /// The PAYMENT this event reverses, for reversal types.
    pub original_event_id: Option<Uuid>,
    /// Effective reversed amount in minor units, for reversal types.
    pub reversal_amount: Option<i64>,
    /// Idempotency key the event was recorded under, if any.
    pub idempotency_key: Option<String>,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the engine recorded the event.
    pub created_at: DateTime<Utc>,
}

impl From<SettlementEvent> for EventResponse {
    fn from(event: SettlementEvent) -> Self {
        Self {
            event_id: Uuid::from(event.event_id),
            event_type: event.event_type.to_string(),
            gross_amount: event.gross_amount,
            coupon_amount: event.coupon_amount,
            paid_amount: event.paid_amount,
            pg_fee: event.pg_fee,
            net_cash: event.net_cash,
            anchor_amount: event.anchor_amount,
            remix_chain: event.remix_chain.into_iter().map(String::from).collect(),
            referrer_id: event.referrer_id.map(String::from),
            creator_root_id: event.creator_root_id.map(String::from),
            template_id: event.template_id,
            artifact_id: event.artifact_id,
            buyer_user_id: event.buyer_user_id,
            original_event_id: event.original_event_id.map(Uuid::from),
            reversal_amount: event.reversal_amount,
            idempotency_key: event.idempotency_key,
            occurred_at: event.occurred_at,
            created_at: event.created_at,
        }
    }
}
