//! Persistence layer: the settlement store seam and its backends.
//!
//! [`SettlementStore`] abstracts the system of record behind coarse-grained
//! operations so each backend owns its own atomicity strategy: the
//! PostgreSQL implementation wraps multi-row writes in transactions with
//! row locking, the in-memory implementation runs each operation inside a
//! single lock critical section. The service layer never sees the
//! difference.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BatchDetail, BatchId, BatchStatus, CreatorHistoryEntry, CreatorId, CreatorShare,
    CreatorSummary, EventId, EventType, GrowthShare, PayoutBatch, PayoutStats, ReferrerSummary,
    ReleaseOutcome, RiskLedgerEntry, SettlementEvent, ShareStatus,
};
use crate::error::SettlementError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// System-of-record operations for the settlement engine.
///
/// Every mutating operation is atomic: either all of its rows land or none
/// do. The risk reserve is append-only; its balance is always computed by
/// summation at read time.
#[async_trait]
pub trait SettlementStore: Send + Sync + std::fmt::Debug {
    /// Persists one settlement event with its ledger rows atomically.
    ///
    /// The share and risk slices may be empty (allocations toggle off, or
    /// nothing non-zero to write); the event row is always written.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::DuplicateReversal`] when a reversal for
    /// the same original event and type already exists,
    /// [`SettlementError::InvalidRequest`] when the idempotency key is
    /// already recorded (lost race with a concurrent retry), or
    /// [`SettlementError::PersistenceError`] on storage failure.
    async fn record_event(
        &self,
        event: &SettlementEvent,
        creator_shares: &[CreatorShare],
        growth_shares: &[GrowthShare],
        risk_entry: Option<&RiskLedgerEntry>,
    ) -> Result<(), SettlementError>;

    /// Fetches a stored settlement event.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::EventNotFound`] when no event has the
    /// given id, or [`SettlementError::PersistenceError`] on storage
    /// failure.
    async fn get_event(&self, event_id: EventId) -> Result<SettlementEvent, SettlementError>;

    /// Looks up a forward event previously recorded under the given
    /// idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn find_event_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<SettlementEvent>, SettlementError>;

    /// Looks up an existing reversal of the given original event and type.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn find_reversal(
        &self,
        original_event_id: EventId,
        event_type: EventType,
    ) -> Result<Option<SettlementEvent>, SettlementError>;

    /// Flips every `held` share whose window expired at or before `now`
    /// to `payable`, creator and growth tables both.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn release_held_shares(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, SettlementError>;

    /// Aggregates one creator's shares by status and channel.
    ///
    /// Creators with no shares get an all-zero summary.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn creator_summary(
        &self,
        creator_id: &CreatorId,
    ) -> Result<CreatorSummary, SettlementError>;

    /// Lists one creator's shares joined with event context, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn creator_history(
        &self,
        creator_id: &CreatorId,
        status: Option<ShareStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreatorHistoryEntry>, SettlementError>;

    /// Aggregates one referrer's growth shares by status.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn referrer_summary(
        &self,
        referrer_id: &CreatorId,
    ) -> Result<ReferrerSummary, SettlementError>;

    /// Current risk reserve balance: `SUM(amount)` over the append-only
    /// ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn risk_pool_balance(&self) -> Result<i64, SettlementError>;

    /// Creates a `draft` payout batch claiming every unclaimed `payable`
    /// creator share created at or before `batch_date`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::NoPayableShares`] when nothing is
    /// eligible, or [`SettlementError::PersistenceError`] on storage
    /// failure.
    async fn create_batch(
        &self,
        batch_date: DateTime<Utc>,
    ) -> Result<BatchDetail, SettlementError>;

    /// Confirms a batch: marks every claimed share `paid` and the batch
    /// `confirmed`, atomically.
    ///
    /// Confirming an already-confirmed batch is a no-op returning the
    /// stored batch; concurrent confirmations serialize on the batch row.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BatchNotFound`] when no batch has the
    /// given id, or [`SettlementError::PersistenceError`] on storage
    /// failure.
    async fn confirm_batch(&self, batch_id: BatchId) -> Result<PayoutBatch, SettlementError>;

    /// Fetches a batch together with its claimed share ids.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BatchNotFound`] when no batch has the
    /// given id, or [`SettlementError::PersistenceError`] on storage
    /// failure.
    async fn get_batch(&self, batch_id: BatchId) -> Result<BatchDetail, SettlementError>;

    /// Lists batches, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn list_batches(
        &self,
        status: Option<BatchStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PayoutBatch>, SettlementError>;

    /// Aggregate payout figures: batch counts, confirmed totals, pending
    /// amounts.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    async fn payout_stats(&self) -> Result<PayoutStats, SettlementError>;
}
