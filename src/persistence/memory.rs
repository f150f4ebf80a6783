//! Volatile in-memory settlement store.
//!
//! Backs local runs with persistence disabled, and the service-layer unit
//! tests. Every operation takes the lock once and does all of its work
//! inside that critical section, which gives the same atomicity the
//! PostgreSQL backend gets from transactions. The duplicate checks mirror
//! the unique indexes of the Postgres schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SettlementStore;
use crate::domain::{
    BatchDetail, BatchId, BatchStatus, CreatorHistoryEntry, CreatorId, CreatorShare,
    CreatorSummary, EventId, EventType, GrowthBucket, GrowthShare, PayoutBatch, PayoutStats,
    ReferrerSummary, ReleaseOutcome, RiskLedgerEntry, SettlementEvent, ShareChannel, ShareStatus,
};
use crate::error::SettlementError;

#[derive(Debug, Default)]
struct MemoryTables {
    events: Vec<SettlementEvent>,
    creator_shares: Vec<CreatorShare>,
    growth_shares: Vec<GrowthShare>,
    risk_ledger: Vec<RiskLedgerEntry>,
    batches: Vec<PayoutBatch>,
}

/// In-memory [`SettlementStore`] with no durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn page(offset: i64, limit: i64) -> (usize, usize) {
    (
        usize::try_from(offset).unwrap_or(0),
        usize::try_from(limit).unwrap_or(0),
    )
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn record_event(
        &self,
        event: &SettlementEvent,
        creator_shares: &[CreatorShare],
        growth_shares: &[GrowthShare],
        risk_entry: Option<&RiskLedgerEntry>,
    ) -> Result<(), SettlementError> {
        let mut tables = self.tables.write().await;

        if let Some(key) = event.idempotency_key.as_deref() {
            if tables
                .events
                .iter()
                .any(|e| e.idempotency_key.as_deref() == Some(key))
            {
                return Err(SettlementError::InvalidRequest(
                    "idempotency key already recorded".to_string(),
                ));
            }
        }
        if let Some(original) = event.original_event_id {
            if tables
                .events
                .iter()
                .any(|e| e.original_event_id == Some(original) && e.event_type == event.event_type)
            {
                return Err(SettlementError::DuplicateReversal {
                    original_event_id: Uuid::from(original),
                    event_type: event.event_type.as_str().to_string(),
                });
            }
        }

        tables.events.push(event.clone());
        tables.creator_shares.extend_from_slice(creator_shares);
        tables.growth_shares.extend_from_slice(growth_shares);
        if let Some(entry) = risk_entry {
            tables.risk_ledger.push(entry.clone());
        }
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<SettlementEvent, SettlementError> {
        let tables = self.tables.read().await;
        tables
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned()
            .ok_or(SettlementError::EventNotFound(Uuid::from(event_id)))
    }

    async fn find_event_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<SettlementEvent>, SettlementError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .find(|e| e.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_reversal(
        &self,
        original_event_id: EventId,
        event_type: EventType,
    ) -> Result<Option<SettlementEvent>, SettlementError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .find(|e| e.original_event_id == Some(original_event_id) && e.event_type == event_type)
            .cloned())
    }

    async fn release_held_shares(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, SettlementError> {
        let mut tables = self.tables.write().await;

        let mut released = Vec::new();
        for share in tables.creator_shares.iter_mut().filter(|s| {
            s.status == ShareStatus::Held && s.hold_until.is_some_and(|until| until <= now)
        }) {
            share.status = ShareStatus::Payable;
            released.push(share.clone());
        }

        let mut growth_released = 0u64;
        for share in tables.growth_shares.iter_mut().filter(|s| {
            s.status == ShareStatus::Held && s.hold_until.is_some_and(|until| until <= now)
        }) {
            share.status = ShareStatus::Payable;
            growth_released += 1;
        }

        Ok(ReleaseOutcome {
            creator_shares: released,
            growth_released,
        })
    }

    async fn creator_summary(
        &self,
        creator_id: &CreatorId,
    ) -> Result<CreatorSummary, SettlementError> {
        let tables = self.tables.read().await;
        let mut summary = CreatorSummary {
            creator_id: creator_id.clone(),
            total_amount: 0,
            held_amount: 0,
            payable_amount: 0,
            paid_amount: 0,
            original_amount: 0,
            remix_amount: 0,
            curation_amount: 0,
            share_count: 0,
        };
        for share in tables
            .creator_shares
            .iter()
            .filter(|s| &s.creator_id == creator_id)
        {
            summary.total_amount += share.amount;
            summary.share_count += 1;
            match share.status {
                ShareStatus::Held => summary.held_amount += share.amount,
                ShareStatus::Payable => summary.payable_amount += share.amount,
                ShareStatus::Paid => summary.paid_amount += share.amount,
            }
            match share.channel {
                ShareChannel::Original => summary.original_amount += share.amount,
                ShareChannel::Remix => summary.remix_amount += share.amount,
                ShareChannel::Curation => summary.curation_amount += share.amount,
            }
        }
        Ok(summary)
    }

    async fn creator_history(
        &self,
        creator_id: &CreatorId,
        status: Option<ShareStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreatorHistoryEntry>, SettlementError> {
        let tables = self.tables.read().await;
        let (offset, limit) = page(offset, limit);
        tables
            .creator_shares
            .iter()
            .rev()
            .filter(|s| &s.creator_id == creator_id)
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .skip(offset)
            .take(limit)
            .map(|share| {
                let event = tables
                    .events
                    .iter()
                    .find(|e| e.event_id == share.event_id)
                    .ok_or_else(|| {
                        SettlementError::PersistenceError(format!(
                            "share {} references missing event",
                            share.share_id
                        ))
                    })?;
                Ok(CreatorHistoryEntry {
                    share: share.clone(),
                    event_type: event.event_type,
                    gross_amount: event.gross_amount,
                    artifact_id: event.artifact_id.clone(),
                    occurred_at: event.occurred_at,
                })
            })
            .collect()
    }

    async fn referrer_summary(
        &self,
        referrer_id: &CreatorId,
    ) -> Result<ReferrerSummary, SettlementError> {
        let tables = self.tables.read().await;
        let mut summary = ReferrerSummary {
            referrer_id: referrer_id.clone(),
            total_amount: 0,
            held_amount: 0,
            payable_amount: 0,
            paid_amount: 0,
            event_count: 0,
        };
        for share in tables.growth_shares.iter().filter(|s| {
            s.bucket == GrowthBucket::Referrer && s.referrer_id.as_ref() == Some(referrer_id)
        }) {
            summary.total_amount += share.amount;
            summary.event_count += 1;
            match share.status {
                ShareStatus::Held => summary.held_amount += share.amount,
                ShareStatus::Payable => summary.payable_amount += share.amount,
                ShareStatus::Paid => summary.paid_amount += share.amount,
            }
        }
        Ok(summary)
    }

    async fn risk_pool_balance(&self) -> Result<i64, SettlementError> {
        let tables = self.tables.read().await;
        Ok(tables.risk_ledger.iter().map(|entry| entry.amount).sum())
    }

    async fn create_batch(
        &self,
        batch_date: DateTime<Utc>,
    ) -> Result<BatchDetail, SettlementError> {
        let mut tables = self.tables.write().await;

        let batch_id = BatchId::new();
        let mut share_ids = Vec::new();
        let mut total_amount = 0i64;
        for share in tables.creator_shares.iter_mut().filter(|s| {
            s.status == ShareStatus::Payable && s.batch_id.is_none() && s.created_at <= batch_date
        }) {
            share.batch_id = Some(batch_id);
            total_amount += share.amount;
            share_ids.push(share.share_id);
        }
        if share_ids.is_empty() {
            return Err(SettlementError::NoPayableShares);
        }

        let batch = PayoutBatch {
            batch_id,
            batch_date,
            status: BatchStatus::Draft,
            total_amount,
            share_count: share_ids.len() as i64,
            created_at: Utc::now(),
            confirmed_at: None,
        };
        tables.batches.push(batch.clone());
        Ok(BatchDetail { batch, share_ids })
    }

    async fn confirm_batch(&self, batch_id: BatchId) -> Result<PayoutBatch, SettlementError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let Some(batch) = tables.batches.iter_mut().find(|b| b.batch_id == batch_id) else {
            return Err(SettlementError::BatchNotFound(Uuid::from(batch_id)));
        };
        if batch.status == BatchStatus::Confirmed {
            return Ok(batch.clone());
        }
        batch.status = BatchStatus::Confirmed;
        batch.confirmed_at = Some(Utc::now());
        let confirmed = batch.clone();

        for share in tables
            .creator_shares
            .iter_mut()
            .filter(|s| s.batch_id == Some(batch_id))
        {
            share.status = ShareStatus::Paid;
        }
        Ok(confirmed)
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<BatchDetail, SettlementError> {
        let tables = self.tables.read().await;
        let Some(batch) = tables.batches.iter().find(|b| b.batch_id == batch_id) else {
            return Err(SettlementError::BatchNotFound(Uuid::from(batch_id)));
        };
        let share_ids = tables
            .creator_shares
            .iter()
            .filter(|s| s.batch_id == Some(batch_id))
            .map(|s| s.share_id)
            .collect();
        Ok(BatchDetail {
            batch: batch.clone(),
            share_ids,
        })
    }

    async fn list_batches(
        &self,
        status: Option<BatchStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PayoutBatch>, SettlementError> {
        let tables = self.tables.read().await;
        let (offset, limit) = page(offset, limit);
        Ok(tables
            .batches
            .iter()
            .rev()
            .filter(|b| status.is_none_or(|wanted| b.status == wanted))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn payout_stats(&self) -> Result<PayoutStats, SettlementError> {
        let tables = self.tables.read().await;
        let mut stats = PayoutStats {
            total_batches: 0,
            draft_batches: 0,
            confirmed_batches: 0,
            confirmed_amount: 0,
            payable_amount: 0,
            held_amount: 0,
        };
        for batch in &tables.batches {
            stats.total_batches += 1;
            match batch.status {
                BatchStatus::Draft => stats.draft_batches += 1,
                BatchStatus::Confirmed => {
                    stats.confirmed_batches += 1;
                    stats.confirmed_amount += batch.total_amount;
                }
            }
        }
        for share in &tables.creator_shares {
            match share.status {
                ShareStatus::Payable if share.batch_id.is_none() => {
                    stats.payable_amount += share.amount;
                }
                ShareStatus::Held => stats.held_amount += share.amount,
                _ => {}
            }
        }
        Ok(stats)
    }
}
