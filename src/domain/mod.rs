//! Domain layer: settlement events, allocations, shares, and batches.
//!
//! This module contains the engine's domain model: type-safe identifiers,
//! the immutable settlement event record, the computed allocation produced
//! by the calculation core, the distribution-ledger rows (creator shares,
//! growth shares, risk entries), and the payout batch lifecycle types.

pub mod allocation;
pub mod batch;
pub mod event;
pub mod ids;
pub mod share;

pub use allocation::{
    Allocation, BalanceCheck, CalcInput, CreatorBreakdown, GrowthBreakdown, PoolSplit, RemixShare,
    ReversalRatio,
};
pub use batch::{BatchDetail, BatchStatus, PayoutBatch, PayoutStats};
pub use event::{EventType, NewSettlementEvent, SettlementEvent};
pub use ids::{BatchId, CreatorId, EventId, ShareId};
pub use share::{
    CreatorHistoryEntry, CreatorShare, CreatorSummary, GrowthBucket, GrowthShare, ReferrerSummary,
    ReleaseOutcome, RiskLedgerEntry, ShareChannel, ShareStatus,
};
