//! Calculation core: splits one event's money into pools.
//!
//! Pure function of its inputs — no I/O, no clock, no randomness — so
//! identical inputs always produce identical output and any number of
//! workers may run it concurrently.

use crate::domain::{
    Allocation, BalanceCheck, CalcInput, CreatorBreakdown, GrowthBreakdown, PoolSplit, RemixShare,
};

use super::rates::{RateCard, round_bps, round_ratio};

/// Computes the full allocation for one forward settlement event.
///
/// Pipeline (every multiplication point rounds half away from zero):
///
/// 1. `paid = gross - coupon`
/// 2. `pg_fee` at the processor rate on `paid`
/// 3. `net_cash = paid - pg_fee`
/// 4. `anchor = gross - pg_fee` — gross-based on purpose: a coupon is a
///    platform-funded discount, so the subsidized portion still counts
///    toward the creator/growth/risk split
/// 5. creator/growth/risk pools rounded off the anchor
/// 6. `platform_actual = net_cash - creator - growth - risk`; the platform
///    absorbs the rounding remainder, which is what makes the conservation
///    invariant exact
/// 7. creator breakdown rounded independently off the creator pool (its
///    sum may drift ±1 from the pool)
/// 8. remix chain truncated to the depth cap, each entry gets
///    `round(remix_total / len)` with no cross-entry absorption
/// 9. growth breakdown: referrer slice rounded, campaign absorbs the
///    remainder; without a referrer the whole pool goes to reserve
/// 10. validation: pools must reconstruct `net_cash` and, with the fee,
///     `paid` — both exactly
#[must_use]
pub fn calculate(input: &CalcInput, rates: &RateCard) -> Allocation {
    let gross = input.gross_amount;
    let coupon = input.coupon_amount;

    let paid_amount = gross - coupon;
    let pg_fee = round_bps(paid_amount, rates.pg_fee_bps);
    let net_cash = paid_amount - pg_fee;
    let anchor_amount = gross - pg_fee;

    let creator = round_bps(anchor_amount, rates.creator_pool_bps);
    let growth = round_bps(anchor_amount, rates.growth_pool_bps);
    let risk = round_bps(anchor_amount, rates.risk_pool_bps);
    let platform_actual = net_cash - creator - growth - risk;

    let original = round_bps(creator, rates.creator_original_bps);
    let remix_total = round_bps(creator, rates.creator_remix_bps);
    let curation = round_bps(creator, rates.creator_curation_bps);

    let chain: Vec<_> = input
        .remix_chain
        .iter()
        .take(rates.remix_max_depth)
        .cloned()
        .collect();
    let remix_shares = if chain.is_empty() {
        Vec::new()
    } else {
        let len = chain.len() as i64;
        let per_creator = round_ratio(remix_total, 1, len);
        chain
            .into_iter()
            .zip(1i16..)
            .map(|(creator_id, depth)| RemixShare {
                creator_id,
                depth,
                amount: per_creator,
            })
            .collect()
    };

    let growth_breakdown = match &input.referrer_id {
        Some(referrer_id) => {
            let referrer = round_ratio(growth, rates.growth_referrer_bps, rates.growth_pool_bps);
            GrowthBreakdown {
                referrer_id: Some(referrer_id.clone()),
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

    Allocation {
        gross_amount: gross,
        coupon_amount: coupon,
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
        creator_breakdown: CreatorBreakdown {
            original,
            remix_total,
            remix_shares,
            curation,
        },
        growth_breakdown,
        validation: BalanceCheck {
            balance_diff,
            balance_check,
        },
        reversal: None,
    }
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

    fn calc(gross: i64, coupon: i64, chain: &[&str], referrer: Option<&str>) -> Allocation {
        calculate(&input(gross, coupon, chain, referrer), &RateCard::default())
    }

    #[test]
    fn plain_payment_10000() {
        let alloc = calc(10_000, 0, &[], None);
        assert_eq!(alloc.paid_amount, 10_000);
        assert_eq!(alloc.pg_fee, 350);
        assert_eq!(alloc.net_cash, 9_650);
        assert_eq!(alloc.anchor_amount, 9_650);
        assert_eq!(alloc.pools.creator, 2_895);
        assert_eq!(alloc.pools.growth, 965);
        assert_eq!(alloc.pools.risk, 483);
        assert_eq!(alloc.pools.platform_actual, 5_307);
        assert_eq!(alloc.pools.total(), alloc.net_cash);
        assert!(alloc.ensure_balanced().is_ok());
        // No referrer: everything in reserve.
        assert_eq!(alloc.growth_breakdown.referrer, 0);
        assert_eq!(alloc.growth_breakdown.campaign, 0);
        assert_eq!(alloc.growth_breakdown.reserve, 965);
        assert!(alloc.reversal.is_none());
    }

    #[test]
    fn referrer_splits_growth_with_campaign_absorbing() {
        let alloc = calc(10_000, 0, &[], Some("ref_1"));
        // 965 * 0.7 = 675.5 -> 676, campaign takes the exact remainder.
        assert_eq!(alloc.growth_breakdown.referrer, 676);
        assert_eq!(alloc.growth_breakdown.campaign, 289);
        assert_eq!(alloc.growth_breakdown.reserve, 0);
        assert_eq!(
            alloc.growth_breakdown.referrer + alloc.growth_breakdown.campaign,
            alloc.pools.growth
        );
        assert_eq!(
            alloc.growth_breakdown.referrer_id,
            Some(CreatorId::from("ref_1"))
        );
    }

    #[test]
    fn creator_breakdown_allows_one_unit_drift() {
        let alloc = calc(10_000, 0, &["creator_p1"], None);
        let b = &alloc.creator_breakdown;
        assert_eq!(b.original, 2_027);
        assert_eq!(b.remix_total, 579);
        assert_eq!(b.curation, 290);
        // 2027 + 579 + 290 = 2896, one over the 2895 pool. Pool-level
        // conservation is untouched by the drift.
        assert_eq!(b.original + b.remix_total + b.curation, alloc.pools.creator + 1);
        assert!(alloc.ensure_balanced().is_ok());
        assert_eq!(b.remix_shares.len(), 1);
        let Some(share) = b.remix_shares.first() else {
            panic!("expected one remix share");
        };
        assert_eq!(share.creator_id, CreatorId::from("creator_p1"));
        assert_eq!(share.depth, 1);
        assert_eq!(share.amount, 579);
    }

    #[test]
    fn coupon_reduces_fee_base_but_not_anchor() {
        let alloc = calc(10_000, 1_000, &[], None);
        assert_eq!(alloc.paid_amount, 9_000);
        assert_eq!(alloc.pg_fee, 315);
        assert_eq!(alloc.net_cash, 8_685);
        // Anchor stays gross-based: 10000 - 315.
        assert_eq!(alloc.anchor_amount, 9_685);
        assert_eq!(alloc.pools.creator, 2_906);
        assert_eq!(alloc.pools.growth, 969);
        assert_eq!(alloc.pools.risk, 484);
        assert_eq!(alloc.pools.platform_actual, 4_326);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn heavy_coupon_squeezes_the_platform() {
        let alloc = calc(20_000, 10_000, &[], None);
        assert_eq!(alloc.paid_amount, 10_000);
        assert_eq!(alloc.pg_fee, 350);
        assert_eq!(alloc.net_cash, 9_650);
        assert_eq!(alloc.anchor_amount, 19_650);
        assert_eq!(alloc.pools.creator, 5_895);
        assert_eq!(alloc.pools.growth, 1_965);
        assert_eq!(alloc.pools.risk, 983);
        // The anchor-based pools eat nearly all the cash.
        assert_eq!(alloc.pools.platform_actual, 807);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn full_coupon_drives_platform_negative() {
        let alloc = calc(10_000, 10_000, &[], None);
        assert_eq!(alloc.paid_amount, 0);
        assert_eq!(alloc.pg_fee, 0);
        assert_eq!(alloc.net_cash, 0);
        assert_eq!(alloc.anchor_amount, 10_000);
        assert_eq!(alloc.pools.creator, 3_000);
        assert_eq!(alloc.pools.growth, 1_000);
        assert_eq!(alloc.pools.risk, 500);
        // Platform funds the whole discount.
        assert_eq!(alloc.pools.platform_actual, -4_500);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn awkward_gross_stays_exact() {
        let alloc = calc(33_333, 0, &[], None);
        assert_eq!(alloc.pg_fee, 1_167);
        assert_eq!(alloc.net_cash, 32_166);
        assert_eq!(alloc.pools.creator, 9_650);
        assert_eq!(alloc.pools.growth, 3_217);
        assert_eq!(alloc.pools.risk, 1_608);
        assert_eq!(alloc.pools.platform_actual, 17_691);
        assert!(alloc.ensure_balanced().is_ok());
        // This pool happens to break down with zero drift.
        let b = &alloc.creator_breakdown;
        assert_eq!(b.original + b.remix_total + b.curation, alloc.pools.creator);
    }

    #[test]
    fn remix_chain_truncates_to_three() {
        let alloc = calc(10_000, 0, &["p1", "p2", "p3", "p4", "p5"], None);
        let shares = &alloc.creator_breakdown.remix_shares;
        assert_eq!(shares.len(), 3);
        // 579 / 3 = 193 exactly.
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.depth, i as i16 + 1);
            assert_eq!(share.amount, 193);
        }
        let ids: Vec<_> = shares.iter().map(|s| s.creator_id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2", "p3"]);
    }

    #[test]
    fn remix_split_rounds_per_entry_without_absorption() {
        let alloc = calc(10_000, 0, &["p1", "p2"], None);
        let shares = &alloc.creator_breakdown.remix_shares;
        // 579 / 2 = 289.5 -> 290 each; 580 total, 1 over remix_total.
        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|s| s.amount == 290));
        let sum: i64 = shares.iter().map(|s| s.amount).sum();
        assert_eq!(sum, alloc.creator_breakdown.remix_total + 1);
    }

    #[test]
    fn three_deep_remix_with_breakdown_drift() {
        let alloc = calc(30_000, 0, &["a", "b", "c"], None);
        assert_eq!(alloc.pg_fee, 1_050);
        assert_eq!(alloc.net_cash, 28_950);
        assert_eq!(alloc.pools.creator, 8_685);
        assert_eq!(alloc.pools.growth, 2_895);
        assert_eq!(alloc.pools.risk, 1_448);
        assert_eq!(alloc.pools.platform_actual, 15_922);
        let b = &alloc.creator_breakdown;
        assert_eq!(b.original, 6_080);
        assert_eq!(b.remix_total, 1_737);
        assert_eq!(b.curation, 869);
        assert_eq!(b.original + b.remix_total + b.curation, alloc.pools.creator + 1);
        assert!(b.remix_shares.iter().all(|s| s.amount == 579));
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn everything_at_once() {
        let alloc = calc(50_000, 5_000, &["p1", "p2"], Some("ref_9"));
        assert_eq!(alloc.paid_amount, 45_000);
        assert_eq!(alloc.pg_fee, 1_575);
        assert_eq!(alloc.net_cash, 43_425);
        assert_eq!(alloc.anchor_amount, 48_425);
        assert_eq!(alloc.pools.creator, 14_528);
        assert_eq!(alloc.pools.growth, 4_843);
        assert_eq!(alloc.pools.risk, 2_421);
        assert_eq!(alloc.pools.platform_actual, 21_633);
        let b = &alloc.creator_breakdown;
        assert_eq!(b.original, 10_170);
        assert_eq!(b.remix_total, 2_906);
        assert_eq!(b.curation, 1_453);
        assert!(b.remix_shares.iter().all(|s| s.amount == 1_453));
        assert_eq!(alloc.growth_breakdown.referrer, 3_390);
        assert_eq!(alloc.growth_breakdown.campaign, 1_453);
        assert_eq!(alloc.growth_breakdown.reserve, 0);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn zero_gross_is_all_zeros() {
        let alloc = calc(0, 0, &[], None);
        assert_eq!(alloc.paid_amount, 0);
        assert_eq!(alloc.pg_fee, 0);
        assert_eq!(alloc.pools.total(), 0);
        assert!(alloc.ensure_balanced().is_ok());
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let x = input(77_777, 1_234, &["p1", "p2", "p3", "p4"], Some("ref_2"));
        let rates = RateCard::default();
        assert_eq!(calculate(&x, &rates), calculate(&x, &rates));
    }

    #[test]
    fn conservation_holds_across_a_sweep() {
        let rates = RateCard::default();
        for gross in (1..200_000).step_by(977) {
            for coupon in [0, gross / 3, gross / 2, gross] {
                let alloc = calculate(&input(gross, coupon, &["p1"], Some("r")), &rates);
                assert_eq!(
                    alloc.pools.total(),
                    alloc.net_cash,
                    "pools must sum to net_cash for gross={gross} coupon={coupon}"
                );
                assert_eq!(
                    alloc.pools.total() + alloc.pg_fee,
                    alloc.paid_amount,
                    "pools + fee must reconstruct paid for gross={gross} coupon={coupon}"
                );
                assert!(alloc.ensure_balanced().is_ok());
            }
        }
    }
}
