//! Rate table and exact integer rounding.
//!
//! All money is `i64` in minor currency units and all rates are integer
//! basis points, so every split is computed with exact integer arithmetic.
//! Binary floating point is deliberately absent: f64 cannot represent most
//! decimal rates and mis-rounds exact halves (`15.0 * 0.30` is
//! `4.4999…`, rounding to 4 where the policy requires 5).

/// Basis-point denominator (1 bps = 1/10 000).
pub const BPS_DENOM: i64 = 10_000;

/// The engine's split-rate table, in basis points.
///
/// These rates are fixed policy, not runtime configuration; the default
/// card is the production table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCard {
    /// Payment-processor fee on the paid amount.
    pub pg_fee_bps: i64,
    /// Platform slice of the anchor. Informational only: the platform's
    /// actual take absorbs the remainder after the other pools are fixed.
    pub platform_bps: i64,
    /// Creator pool slice of the anchor.
    pub creator_pool_bps: i64,
    /// Growth pool slice of the anchor.
    pub growth_pool_bps: i64,
    /// Risk reserve slice of the anchor.
    pub risk_pool_bps: i64,
    /// Original creator's slice of the creator pool.
    pub creator_original_bps: i64,
    /// Remix chain's slice of the creator pool.
    pub creator_remix_bps: i64,
    /// Curation slice of the creator pool.
    pub creator_curation_bps: i64,
    /// Referrer slice of the anchor. The referrer's cut of the growth pool
    /// is `growth_referrer_bps / growth_pool_bps`.
    pub growth_referrer_bps: i64,
    /// Campaign slice of the anchor; absorbs the growth-pool remainder
    /// when a referrer is present.
    pub growth_campaign_bps: i64,
    /// Maximum remix chain depth credited; longer chains are truncated.
    pub remix_max_depth: usize,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            pg_fee_bps: 350,
            platform_bps: 5_500,
            creator_pool_bps: 3_000,
            growth_pool_bps: 1_000,
            risk_pool_bps: 500,
            creator_original_bps: 7_000,
            creator_remix_bps: 2_000,
            creator_curation_bps: 1_000,
            growth_referrer_bps: 700,
            growth_campaign_bps: 300,
            remix_max_depth: 3,
        }
    }
}

/// Rounds `amount * bps / 10_000` half away from zero.
#[must_use]
pub fn round_bps(amount: i64, bps: i64) -> i64 {
    round_ratio(amount, bps, BPS_DENOM)
}

/// Rounds `amount * num / denom` half away from zero, exactly.
///
/// Uses i128 intermediates so the product never overflows. `denom` must be
/// positive; callers keep `|num| <= denom`, so the result fits in i64
/// whenever `amount` does.
#[must_use]
pub fn round_ratio(amount: i64, num: i64, denom: i64) -> i64 {
    debug_assert!(denom > 0, "round_ratio denominator must be positive");
    let p = i128::from(amount) * i128::from(num);
    let q = i128::from(denom);
    // Truncating division of (2p ± q) by 2q rounds half away from zero.
    let adjusted = if p >= 0 { 2 * p + q } else { 2 * p - q };
    #[allow(clippy::cast_possible_truncation)]
    let rounded = (adjusted / (2 * q)) as i64;
    rounded
}
