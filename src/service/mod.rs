//! Service layer: settlement orchestration.
//!
//! [`SettlementService`] validates requests, delegates the money math to
//! `calc`, and persists results through the [`crate::persistence`] store
//! seam. It also drives the hold/release and payout batch lifecycles.

pub mod settlement_service;

pub use settlement_service::{IngestOutcome, SettlementService};
