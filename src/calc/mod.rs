//! Calculation core: pure, deterministic money splitting.
//!
//! [`engine::calculate`] produces the forward allocation for a payment;
//! [`reversal::calculate_reversal`] derives the scaled, negated allocation
//! for refunds, chargebacks, and fee adjustments. Both are pure functions
//! over [`rates::RateCard`] with exact integer arithmetic throughout.

pub mod engine;
pub mod rates;
pub mod reversal;

pub use engine::calculate;
pub use rates::{RateCard, round_bps, round_ratio};
pub use reversal::calculate_reversal;
