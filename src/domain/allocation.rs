//! Allocation types: the validated output of the calculation core.
//!
//! An [`Allocation`] is computed synchronously when an event is ingested
//! and never mutated afterwards; corrections arrive as new reversal events.
//! It is not stored standalone — the ledger persists it as creator shares,
//! growth shares, and a risk entry.

use serde::Serialize;

use super::{CreatorId, SettlementEvent};
use crate::error::SettlementError;

/// Parameters the calculation core operates on.
///
/// For reversal events these are the *original* payment's parameters,
/// resolved from the stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcInput {
    /// Gross transaction amount in minor units.
    pub gross_amount: i64,
    /// Coupon discount in minor units.
    pub coupon_amount: i64,
    /// Remix chain, outermost first (may exceed the depth cap; the core
    /// truncates).
    pub remix_chain: Vec<CreatorId>,
    /// Referrer credited with the sale, if any.
    pub referrer_id: Option<CreatorId>,
}

impl From<&SettlementEvent> for CalcInput {
    fn from(event: &SettlementEvent) -> Self {
        Self {
            gross_amount: event.gross_amount,
            coupon_amount: event.coupon_amount,
            remix_chain: event.remix_chain.clone(),
            referrer_id: event.referrer_id.clone(),
        }
    }
}

/// Top-level pool split. All amounts in minor units; negative on reversals.
///
/// `platform_actual` is never independently rounded: it absorbs whatever
/// remains of `net_cash` after the other three pools are fixed, so the
/// conservation invariant holds exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSplit {
    /// Platform take after remainder absorption.
    pub platform_actual: i64,
    /// Creator pool (original + remix + curation source).
    pub creator: i64,
    /// Growth pool (referrer/campaign/reserve source).
    pub growth: i64,
    /// Risk reserve deposit (withdrawal when negative).
    pub risk: i64,
}

impl PoolSplit {
    /// Sum of all four pools. Equals `net_cash` when balanced.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.platform_actual + self.creator + self.growth + self.risk
    }
}

/// One remix creator's slice of the remix sub-pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemixShare {
    /// The upstream creator receiving this slice.
    pub creator_id: CreatorId,
    /// Position in the remix chain, 1-based, capped at the depth limit.
    pub depth: i16,
    /// Slice amount in minor units.
    pub amount: i64,
}

/// Breakdown of the creator pool.
///
/// Each figure is independently rounded off the creator pool, so their sum
/// may drift from the pool by ±1 minor unit; pool-level conservation is
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorBreakdown {
    /// Original creator's slice.
    pub original: i64,
    /// Total set aside for the remix chain.
    pub remix_total: i64,
    /// Per-creator remix slices (empty when the chain is empty).
    pub remix_shares: Vec<RemixShare>,
    /// Curation slice.
    pub curation: i64,
}

/// Breakdown of the growth pool.
///
/// With a referrer: `referrer` is rounded, `campaign` absorbs the exact
/// remainder, `reserve` is 0. Without: the whole pool goes to `reserve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthBreakdown {
    /// Referrer credited, if any.
    pub referrer_id: Option<CreatorId>,
    /// Referrer slice in minor units.
    pub referrer: i64,
    /// Campaign slice (remainder-absorbed when a referrer is present).
    pub campaign: i64,
    /// Unattributed reserve slice.
    pub reserve: i64,
}

/// The fraction of an original payment being undone, as an exact rational.
///
/// Always in `(0, 1]`: `reversed_amount <= original_paid` and both are
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReversalRatio {
    /// Effective reversed amount in minor units (numerator).
    pub reversed_amount: i64,
    /// The original payment's paid amount in minor units (denominator).
    pub original_paid: i64,
}

/// Result of the exact-conservation validation (calculation step 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    /// `net_cash - (platform_actual + creator + growth + risk)`. Must be 0.
    pub balance_diff: i64,
    /// True iff `balance_diff == 0` and pools + fee reconstruct
    /// `paid_amount` exactly.
    pub balance_check: bool,
}

/// Complete validated allocation for one settlement event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Gross amount the allocation was computed from.
    pub gross_amount: i64,
    /// Coupon amount the allocation was computed from.
    pub coupon_amount: i64,
    /// `gross - coupon`; scaled and negated on reversals.
    pub paid_amount: i64,
    /// Payment-processor fee; scaled and negated on reversals.
    pub pg_fee: i64,
    /// `paid - fee`; scaled and negated on reversals.
    pub net_cash: i64,
    /// `gross - fee`, the pool-split base; scaled and negated on reversals.
    pub anchor_amount: i64,
    /// Top-level pool split.
    pub pools: PoolSplit,
    /// Creator pool breakdown.
    pub creator_breakdown: CreatorBreakdown,
    /// Growth pool breakdown.
    pub growth_breakdown: GrowthBreakdown,
    /// Exact-conservation validation result.
    pub validation: BalanceCheck,
    /// Present on reversal allocations: the ratio that scaled the original.
    pub reversal: Option<ReversalRatio>,
}

impl Allocation {
    /// Rejects an allocation that failed exact conservation.
    ///
    /// A failure here is an internal defect, not a bad request: the caller
    /// must log it at error level and persist nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BalanceInvariantViolation`] if the
    /// balance check did not pass.
    pub const fn ensure_balanced(&self) -> Result<(), SettlementError> {
        if self.validation.balance_check && self.validation.balance_diff == 0 {
            Ok(())
        } else {
            Err(SettlementError::BalanceInvariantViolation {
                diff: self.validation.balance_diff,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn balanced_allocation() -> Allocation {
        Allocation {
            gross_amount: 10_000,
            coupon_amount: 0,
            paid_amount: 10_000,
            pg_fee: 350,
            net_cash: 9_650,
            anchor_amount: 9_650,
            pools: PoolSplit {
                platform_actual: 5_307,
                creator: 2_895,
                growth: 965,
                risk: 483,
            },
            creator_breakdown: CreatorBreakdown {
                original: 2_027,
                remix_total: 579,
                remix_shares: vec![],
                curation: 290,
            },
            growth_breakdown: GrowthBreakdown {
                referrer_id: None,
                referrer: 0,
                campaign: 0,
                reserve: 965,
            },
            validation: BalanceCheck {
                balance_diff: 0,
                balance_check: true,
            },
            reversal: None,
        }
    }

    #[test]
    fn pool_total_matches_net_cash_when_balanced() {
        let alloc = balanced_allocation();
        assert_eq!(alloc.pools.total(), alloc.net_cash);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn ensure_balanced_rejects_nonzero_diff() {
        let mut alloc = balanced_allocation();
        alloc.validation = BalanceCheck {
            balance_diff: 1,
            balance_check: false,
        };
        let Err(SettlementError::BalanceInvariantViolation { diff }) = alloc.ensure_balanced()
        else {
            panic!("expected BalanceInvariantViolation");
        };
        assert_eq!(diff, 1);
    }

    #[test]
    fn calc_input_from_event_carries_split_parameters() {
        let event = SettlementEvent {
            event_id: crate::domain::EventId::new(),
            event_type: crate::domain::EventType::Payment,
            gross_amount: 10_000,
            coupon_amount: 1_000,
            paid_amount: 9_000,
            pg_fee: 315,
            net_cash: 8_685,
            anchor_amount: 9_685,
            remix_chain: vec![CreatorId::from("creator_p1")],
            referrer_id: Some(CreatorId::from("ref_1")),
            creator_root_id: None,
            template_id: None,
            artifact_id: None,
            buyer_user_id: None,
            original_event_id: None,
            reversal_amount: None,
            idempotency_key: None,
            occurred_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };
        let input = CalcInput::from(&event);
        assert_eq!(input.gross_amount, 10_000);
        assert_eq!(input.coupon_amount, 1_000);
        assert_eq!(input.remix_chain.len(), 1);
        assert_eq!(input.referrer_id, Some(CreatorId::from("ref_1")));
    }
}
