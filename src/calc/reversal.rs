//! Reversal calculator: derives a scaled, negated allocation for refunds,
//! chargebacks, and fee adjustments.
//!
//! The reversal replays the calculation core against the *original*
//! payment's parameters, then scales every figure by the reversed fraction
//! and flips the sign. The scaling ratio is carried as an exact rational
//! (`reversed_amount / original_paid`) — never a float.

use crate::domain::{
    Allocation, BalanceCheck, CalcInput, CreatorBreakdown, GrowthBreakdown, PoolSplit, RemixShare,
    ReversalRatio,
};
use crate::error::SettlementError;

use super::engine::calculate;
use super::rates::{RateCard, round_ratio};

/// Computes the allocation reversing (part of) an original payment.
///
/// `original` carries the original PAYMENT's parameters; `reversal_amount`
/// is the portion of its paid amount being undone (`None` = the full paid
/// amount). The forward allocation is recomputed, each independently
/// rounded figure is scaled by the reversal ratio and negated, and the
/// remainder-absorption discipline of the forward pass is re-applied on
/// the scaled values (`net = paid - fee`, platform absorbs the pool
/// remainder, campaign absorbs the growth remainder), so conservation is
/// exact for every ratio, not only full reversals.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidReversalAmount`] when the effective
/// reversal amount is not in `(0, original_paid]` — including the case of
/// an original that paid nothing (fully couponed).
pub fn calculate_reversal(
    original: &CalcInput,
    reversal_amount: Option<i64>,
    rates: &RateCard,
) -> Result<Allocation, SettlementError> {
    let forward = calculate(original, rates);
    let original_paid = forward.paid_amount;

    let effective = reversal_amount.unwrap_or(original_paid);
    if effective <= 0 || effective > original_paid {
        return Err(SettlementError::InvalidReversalAmount {
            requested: effective,
            original_paid,
        });
    }
    let ratio = ReversalRatio {
        reversed_amount: effective,
        original_paid,
    };

    // Scale an independently rounded forward figure and flip its sign.
    let scale_neg = |amount: i64| -round_ratio(amount, effective, original_paid);

    let paid_amount = -effective;
    let pg_fee = scale_neg(forward.pg_fee);
    let net_cash = paid_amount - pg_fee;
    let anchor_amount = scale_neg(forward.anchor_amount);

    let creator = scale_neg(forward.pools.creator);
    let growth = scale_neg(forward.pools.growth);
    let risk = scale_neg(forward.pools.risk);
    let platform_actual = net_cash - creator - growth - risk;

    let remix_shares = forward
        .creator_breakdown
        .remix_shares
        .iter()
        .map(|share| RemixShare {
            creator_id: share.creator_id.clone(),
            depth: share.depth,
            amount: scale_neg(share.amount),
        })
        .collect();
    let creator_breakdown = CreatorBreakdown {
        original: scale_neg(forward.creator_breakdown.original),
        remix_total: scale_neg(forward.creator_breakdown.remix_total),
        remix_shares,
        curation: scale_neg(forward.creator_breakdown.curation),
    };

    let growth_breakdown = match forward.growth_breakdown.referrer_id {
        Some(referrer_id) => {
            let referrer = scale_neg(forward.growth_breakdown.referrer);
            GrowthBreakdown {
                referrer_id: Some(referrer_id),
                referrer,
                campaign: growth - referrer,
                reserve: 0,
            }
        }
        None => GrowthBreakdown {
            referrer_id: None,
            referrer: 0,
            campaign: 0,
            reserve: growth,
        },
    };

    let balance_diff = net_cash - (platform_actual + creator + growth + risk);
    let balance_check =
        balance_diff == 0 && platform_actual + creator + growth + risk + pg_fee == paid_amount;

    Ok(Allocation {
        gross_amount: forward.gross_amount,
        coupon_amount: forward.coupon_amount,
        paid_amount,
        pg_fee,
        net_cash,
        anchor_amount,
        pools: PoolSplit {
            platform_actual,
            creator,
            growth,
            risk,
        },
        creator_breakdown,
        growth_breakdown,
        validation: BalanceCheck {
            balance_diff,
            balance_check,
        },
        reversal: Some(ratio),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::CreatorId;

    fn input(gross: i64, coupon: i64, chain: &[&str], referrer: Option<&str>) -> CalcInput {
        CalcInput {
            gross_amount: gross,
            coupon_amount: coupon,
            remix_chain: chain.iter().map(|c| CreatorId::from(*c)).collect(),
            referrer_id: referrer.map(CreatorId::from),
        }
    }

    fn reverse(
        gross: i64,
        coupon: i64,
        chain: &[&str],
        referrer: Option<&str>,
        amount: Option<i64>,
    ) -> Result<Allocation, SettlementError> {
        calculate_reversal(&input(gross, coupon, chain, referrer), amount, &RateCard::default())
    }

    #[test]
    fn full_reversal_is_exact_negation() {
        let original = input(10_000, 0, &["p1"], Some("ref_1"));
        let rates = RateCard::default();
        let forward = calculate(&original, &rates);
        let Ok(reversed) = calculate_reversal(&original, None, &rates) else {
            panic!("full reversal should succeed");
        };

        assert_eq!(reversed.paid_amount, -forward.paid_amount);
        assert_eq!(reversed.pg_fee, -forward.pg_fee);
        assert_eq!(reversed.net_cash, -forward.net_cash);
        assert_eq!(reversed.anchor_amount, -forward.anchor_amount);
        assert_eq!(reversed.pools.platform_actual, -forward.pools.platform_actual);
        assert_eq!(reversed.pools.creator, -forward.pools.creator);
        assert_eq!(reversed.pools.growth, -forward.pools.growth);
        assert_eq!(reversed.pools.risk, -forward.pools.risk);
        assert_eq!(
            reversed.creator_breakdown.original,
            -forward.creator_breakdown.original
        );
        assert_eq!(
            reversed.growth_breakdown.referrer,
            -forward.growth_breakdown.referrer
        );
        assert_eq!(
            reversed.growth_breakdown.campaign,
            -forward.growth_breakdown.campaign
        );
        assert!(reversed.ensure_balanced().is_ok());
        assert_eq!(
            reversed.reversal,
            Some(ReversalRatio {
                reversed_amount: 10_000,
                original_paid: 10_000,
            })
        );
    }

    #[test]
    fn half_reversal_scales_and_rounds_each_figure() {
        let Ok(reversed) = reverse(10_000, 0, &["p1"], None, Some(5_000)) else {
            panic!("half reversal should succeed");
        };
        assert_eq!(reversed.paid_amount, -5_000);
        assert_eq!(reversed.pg_fee, -175);
        assert_eq!(reversed.net_cash, -4_825);
        // 2895 * 0.5 = 1447.5 -> 1448; 483 * 0.5 = 241.5 -> 242.
        assert_eq!(reversed.pools.creator, -1_448);
        assert_eq!(reversed.pools.growth, -483);
        assert_eq!(reversed.pools.risk, -242);
        assert_eq!(reversed.pools.platform_actual, -2_652);
        assert_eq!(reversed.pools.total(), reversed.net_cash);
        // Breakdown halves round away from zero too: 2027->1014, 579->290.
        assert_eq!(reversed.creator_breakdown.original, -1_014);
        assert_eq!(reversed.creator_breakdown.remix_total, -290);
        assert_eq!(reversed.creator_breakdown.curation, -145);
        assert!(reversed.ensure_balanced().is_ok());
    }

    #[test]
    fn partial_reversal_with_referrer_reapplies_absorption() {
        // Original: gross 20000, one remix hop, referrer. Reverse 6500
        // (ratio 0.325).
        let Ok(reversed) = reverse(20_000, 0, &["p1"], Some("ref_1"), Some(6_500)) else {
            panic!("partial reversal should succeed");
        };
        assert_eq!(reversed.paid_amount, -6_500);
        // 700 * 0.325 = 227.5 -> 228.
        assert_eq!(reversed.pg_fee, -228);
        assert_eq!(reversed.net_cash, -6_272);
        assert_eq!(reversed.pools.creator, -1_882);
        assert_eq!(reversed.pools.growth, -627);
        assert_eq!(reversed.pools.risk, -314);
        assert_eq!(reversed.pools.platform_actual, -3_449);
        // 1351 * 0.325 = 439.075 -> 439; campaign absorbs the rest.
        assert_eq!(reversed.growth_breakdown.referrer, -439);
        assert_eq!(reversed.growth_breakdown.campaign, -188);
        assert_eq!(
            reversed.growth_breakdown.referrer + reversed.growth_breakdown.campaign,
            reversed.pools.growth
        );
        assert_eq!(reversed.creator_breakdown.original, -1_317);
        let Some(share) = reversed.creator_breakdown.remix_shares.first() else {
            panic!("expected one remix share");
        };
        assert_eq!(share.amount, -376);
        assert_eq!(reversed.creator_breakdown.curation, -188);
        assert!(reversed.ensure_balanced().is_ok());
    }

    #[test]
    fn without_referrer_reserve_absorbs_scaled_growth() {
        let Ok(reversed) = reverse(10_000, 0, &[], None, Some(3_333)) else {
            panic!("reversal should succeed");
        };
        assert_eq!(reversed.growth_breakdown.referrer, 0);
        assert_eq!(reversed.growth_breakdown.campaign, 0);
        assert_eq!(reversed.growth_breakdown.reserve, reversed.pools.growth);
        assert!(reversed.ensure_balanced().is_ok());
    }

    #[test]
    fn zero_reversal_amount_is_rejected() {
        let Err(SettlementError::InvalidReversalAmount {
            requested,
            original_paid,
        }) = reverse(10_000, 0, &[], None, Some(0))
        else {
            panic!("expected InvalidReversalAmount");
        };
        assert_eq!(requested, 0);
        assert_eq!(original_paid, 10_000);
    }

    #[test]
    fn negative_reversal_amount_is_rejected() {
        assert!(matches!(
            reverse(10_000, 0, &[], None, Some(-1)),
            Err(SettlementError::InvalidReversalAmount { .. })
        ));
    }

    #[test]
    fn over_reversal_is_rejected() {
        // Coupon shrinks paid to 9000; reversing 9001 must fail.
        let Err(SettlementError::InvalidReversalAmount {
            requested,
            original_paid,
        }) = reverse(10_000, 1_000, &[], None, Some(9_001))
        else {
            panic!("expected InvalidReversalAmount");
        };
        assert_eq!(requested, 9_001);
        assert_eq!(original_paid, 9_000);
    }

    #[test]
    fn fully_couponed_original_cannot_be_reversed() {
        // paid = 0, so even the implicit full reversal has nothing to undo.
        assert!(matches!(
            reverse(10_000, 10_000, &[], None, None),
            Err(SettlementError::InvalidReversalAmount {
                requested: 0,
                original_paid: 0,
            })
        ));
    }

    #[test]
    fn conservation_holds_for_every_ratio() {
        let original = input(3_330, 0, &["p1", "p2"], Some("r"));
        let rates = RateCard::default();
        for effective in 1..=3_330 {
            let Ok(reversed) = calculate_reversal(&original, Some(effective), &rates) else {
                panic!("reversal of {effective} should succeed");
            };
            assert_eq!(
                reversed.pools.total(),
                reversed.net_cash,
                "pools must sum to net_cash at effective={effective}"
            );
            assert_eq!(
                reversed.pools.total() + reversed.pg_fee,
                reversed.paid_amount,
                "pools + fee must reconstruct paid at effective={effective}"
            );
            assert!(reversed.ensure_balanced().is_ok());
        }
    }
}
