//! PostgreSQL implementation of the settlement store.
//!
//! All multi-row mutations run inside a single transaction; batch
//! operations lock the rows they are about to mutate with `FOR UPDATE` so
//! concurrent claims and confirmations serialize instead of interleaving.
//! The unique indexes on idempotency key and `(original_event_id,
//! event_type)` backstop the service-level duplicate checks under races.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::SettlementStore;
use super::models::{BatchRow, CreatorShareRow, EventRow, HistoryRow};
use crate::config::EngineConfig;
use crate::domain::{
    BatchDetail, BatchId, BatchStatus, CreatorHistoryEntry, CreatorId, CreatorShare,
    CreatorSummary, EventId, EventType, GrowthShare, PayoutBatch, PayoutStats, ReferrerSummary,
    ReleaseOutcome, RiskLedgerEntry, SettlementEvent, ShareId, ShareStatus,
};
use crate::error::SettlementError;

const SELECT_EVENT: &str = "SELECT event_id, event_type, gross_amount, coupon_amount, \
     paid_amount, pg_fee, net_cash, anchor_amount, remix_chain, referrer_id, \
     creator_root_id, template_id, artifact_id, buyer_user_id, original_event_id, \
     reversal_amount, idempotency_key, occurred_at, created_at FROM settlement_events";

const SELECT_BATCH: &str = "SELECT batch_id, batch_date, status, total_amount, \
     share_count, created_at, confirmed_at FROM payout_batches";

/// PostgreSQL-backed settlement store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool per the engine configuration and runs pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ServiceUnavailable`] when the database
    /// cannot be reached, or [`SettlementError::PersistenceError`] when a
    /// migration fails.
    pub async fn connect(config: &EngineConfig) -> Result<Self, SettlementError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                SettlementError::ServiceUnavailable(format!("database connect failed: {e}"))
            })?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Maps the event-insert unique violations onto the duplicate errors.
    fn map_event_insert_err(event: &SettlementEvent, e: sqlx::Error) -> SettlementError {
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some("23505") {
                let constraint = db.constraint().unwrap_or_default();
                if constraint.contains("reversal") {
                    return SettlementError::DuplicateReversal {
                        original_event_id: event
                            .original_event_id
                            .map(Uuid::from)
                            .unwrap_or_default(),
                        event_type: event.event_type.as_str().to_string(),
                    };
                }
                if constraint.contains("idempotency") {
                    return SettlementError::InvalidRequest(
                        "idempotency key already recorded".to_string(),
                    );
                }
            }
        }
        SettlementError::PersistenceError(e.to_string())
    }
}

#[async_trait]
impl SettlementStore for PostgresStore {
    async fn record_event(
        &self,
        event: &SettlementEvent,
        creator_shares: &[CreatorShare],
        growth_shares: &[GrowthShare],
        risk_entry: Option<&RiskLedgerEntry>,
    ) -> Result<(), SettlementError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let remix_chain: Vec<String> = event.remix_chain.iter().cloned().map(String::from).collect();
        sqlx::query(
            "INSERT INTO settlement_events (event_id, event_type, gross_amount, coupon_amount, \
             paid_amount, pg_fee, net_cash, anchor_amount, remix_chain, referrer_id, \
             creator_root_id, template_id, artifact_id, buyer_user_id, original_event_id, \
             reversal_amount, idempotency_key, occurred_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19)",
        )
        .bind(Uuid::from(event.event_id))
        .bind(event.event_type.as_str())
        .bind(event.gross_amount)
        .bind(event.coupon_amount)
        .bind(event.paid_amount)
        .bind(event.pg_fee)
        .bind(event.net_cash)
        .bind(event.anchor_amount)
        .bind(remix_chain)
        .bind(event.referrer_id.as_ref().map(CreatorId::as_str))
        .bind(event.creator_root_id.as_ref().map(CreatorId::as_str))
        .bind(event.template_id.as_deref())
        .bind(event.artifact_id.as_deref())
        .bind(event.buyer_user_id.as_deref())
        .bind(event.original_event_id.map(Uuid::from))
        .bind(event.reversal_amount)
        .bind(event.idempotency_key.as_deref())
        .bind(event.occurred_at)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::map_event_insert_err(event, e))?;

        for share in creator_shares {
            sqlx::query(
                "INSERT INTO creator_shares (share_id, event_id, creator_id, channel, \
                 remix_depth, amount, status, hold_until, batch_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(Uuid::from(share.share_id))
            .bind(Uuid::from(share.event_id))
            .bind(share.creator_id.as_str())
            .bind(share.channel.as_str())
            .bind(share.remix_depth)
            .bind(share.amount)
            .bind(share.status.as_str())
            .bind(share.hold_until)
            .bind(share.batch_id.map(Uuid::from))
            .bind(share.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;
        }

        for share in growth_shares {
            sqlx::query(
                "INSERT INTO growth_shares (share_id, event_id, bucket, referrer_id, amount, \
                 status, hold_until, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::from(share.share_id))
            .bind(Uuid::from(share.event_id))
            .bind(share.bucket.as_str())
            .bind(share.referrer_id.as_ref().map(CreatorId::as_str))
            .bind(share.amount)
            .bind(share.status.as_str())
            .bind(share.hold_until)
            .bind(share.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;
        }

        if let Some(entry) = risk_entry {
            sqlx::query(
                "INSERT INTO risk_ledger (event_id, event_type, amount, created_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::from(entry.event_id))
            .bind(entry.event_type.as_str())
            .bind(entry.amount)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))
    }

    async fn get_event(&self, event_id: EventId) -> Result<SettlementEvent, SettlementError> {
        let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} WHERE event_id = $1"))
            .bind(Uuid::from(event_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        row.ok_or(SettlementError::EventNotFound(Uuid::from(event_id)))?
            .try_into()
    }

    async fn find_event_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<SettlementEvent>, SettlementError> {
        let row =
            sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} WHERE idempotency_key = $1"))
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        row.map(SettlementEvent::try_from).transpose()
    }

    async fn find_reversal(
        &self,
        original_event_id: EventId,
        event_type: EventType,
    ) -> Result<Option<SettlementEvent>, SettlementError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_EVENT} WHERE original_event_id = $1 AND event_type = $2"
        ))
        .bind(Uuid::from(original_event_id))
        .bind(event_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        row.map(SettlementEvent::try_from).transpose()
    }

    async fn release_held_shares(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, SettlementError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let rows = sqlx::query_as::<_, CreatorShareRow>(
            "UPDATE creator_shares SET status = 'payable' \
             WHERE status = 'held' AND hold_until IS NOT NULL AND hold_until <= $1 \
             RETURNING share_id, event_id, creator_id, channel, remix_depth, amount, status, \
             hold_until, batch_id, created_at",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let growth = sqlx::query(
            "UPDATE growth_shares SET status = 'payable' \
             WHERE status = 'held' AND hold_until IS NOT NULL AND hold_until <= $1",
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let creator_shares = rows
            .into_iter()
            .map(CreatorShare::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReleaseOutcome {
            creator_shares,
            growth_released: growth.rows_affected(),
        })
    }

    async fn creator_summary(
        &self,
        creator_id: &CreatorId,
    ) -> Result<CreatorSummary, SettlementError> {
        let (total, held, payable, paid, original, remix, curation, count) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64, i64)>(
                "SELECT COALESCE(SUM(amount), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE status = 'held'), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE status = 'payable'), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE channel = 'original'), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE channel = 'remix'), 0)::BIGINT, \
                 COALESCE(SUM(amount) FILTER (WHERE channel = 'curation'), 0)::BIGINT, \
                 COUNT(*) FROM creator_shares WHERE creator_id = $1",
            )
            .bind(creator_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(CreatorSummary {
            creator_id: creator_id.clone(),
            total_amount: total,
            held_amount: held,
            payable_amount: payable,
            paid_amount: paid,
            original_amount: original,
            remix_amount: remix,
            curation_amount: curation,
            share_count: count,
        })
    }

    async fn creator_history(
        &self,
        creator_id: &CreatorId,
        status: Option<ShareStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreatorHistoryEntry>, SettlementError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, HistoryRow>(
                "SELECT s.share_id, s.event_id, s.creator_id, s.channel, s.remix_depth, \
                 s.amount, s.status, s.hold_until, s.batch_id, s.created_at, \
                 e.event_type, e.gross_amount, e.artifact_id, e.occurred_at \
                 FROM creator_shares s JOIN settlement_events e ON e.event_id = s.event_id \
                 WHERE s.creator_id = $1 AND s.status = $2 \
                 ORDER BY s.created_at DESC LIMIT $3 OFFSET $4",
            )
            .bind(creator_id.as_str())
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, HistoryRow>(
                "SELECT s.share_id, s.event_id, s.creator_id, s.channel, s.remix_depth, \
                 s.amount, s.status, s.hold_until, s.batch_id, s.created_at, \
                 e.event_type, e.gross_amount, e.artifact_id, e.occurred_at \
                 FROM creator_shares s JOIN settlement_events e ON e.event_id = s.event_id \
                 WHERE s.creator_id = $1 ORDER BY s.created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(creator_id.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        rows.into_iter().map(CreatorHistoryEntry::try_from).collect()
    }

    async fn referrer_summary(
        &self,
        referrer_id: &CreatorId,
    ) -> Result<ReferrerSummary, SettlementError> {
        let (total, held, payable, paid, count) = sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT, \
             COALESCE(SUM(amount) FILTER (WHERE status = 'held'), 0)::BIGINT, \
             COALESCE(SUM(amount) FILTER (WHERE status = 'payable'), 0)::BIGINT, \
             COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::BIGINT, \
             COUNT(*) FROM growth_shares WHERE bucket = 'referrer' AND referrer_id = $1",
        )
        .bind(referrer_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(ReferrerSummary {
            referrer_id: referrer_id.clone(),
            total_amount: total,
            held_amount: held,
            payable_amount: payable,
            paid_amount: paid,
            event_count: count,
        })
    }

    async fn risk_pool_balance(&self) -> Result<i64, SettlementError> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM risk_ledger")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))
    }

    async fn create_batch(
        &self,
        batch_date: DateTime<Utc>,
    ) -> Result<BatchDetail, SettlementError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        // Lock candidates so a concurrent batch creation cannot claim the
        // same shares.
        let candidates = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT share_id, amount FROM creator_shares \
             WHERE status = 'payable' AND batch_id IS NULL AND created_at <= $1 \
             ORDER BY created_at FOR UPDATE",
        )
        .bind(batch_date)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        if candidates.is_empty() {
            return Err(SettlementError::NoPayableShares);
        }

        let batch_id = BatchId::new();
        let created_at = Utc::now();
        let total_amount: i64 = candidates.iter().map(|(_, amount)| amount).sum();
        let share_count = candidates.len() as i64;
        let share_uuids: Vec<Uuid> = candidates.iter().map(|(id, _)| *id).collect();

        sqlx::query(
            "INSERT INTO payout_batches (batch_id, batch_date, status, total_amount, \
             share_count, created_at) VALUES ($1, $2, 'draft', $3, $4, $5)",
        )
        .bind(Uuid::from(batch_id))
        .bind(batch_date)
        .bind(total_amount)
        .bind(share_count)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        sqlx::query("UPDATE creator_shares SET batch_id = $1 WHERE share_id = ANY($2)")
            .bind(Uuid::from(batch_id))
            .bind(&share_uuids)
            .execute(&mut *tx)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(BatchDetail {
            batch: PayoutBatch {
                batch_id,
                batch_date,
                status: BatchStatus::Draft,
                total_amount,
                share_count,
                created_at,
                confirmed_at: None,
            },
            share_ids: share_uuids.into_iter().map(ShareId::from_uuid).collect(),
        })
    }

    async fn confirm_batch(&self, batch_id: BatchId) -> Result<PayoutBatch, SettlementError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        // Concurrent confirmations serialize here; the loser observes
        // status = 'confirmed' and returns the stored result.
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "{SELECT_BATCH} WHERE batch_id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(batch_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let Some(row) = row else {
            return Err(SettlementError::BatchNotFound(Uuid::from(batch_id)));
        };
        let batch: PayoutBatch = row.try_into()?;
        if batch.status == BatchStatus::Confirmed {
            return Ok(batch);
        }

        let confirmed_at = Utc::now();
        sqlx::query("UPDATE creator_shares SET status = 'paid' WHERE batch_id = $1")
            .bind(Uuid::from(batch_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "UPDATE payout_batches SET status = 'confirmed', confirmed_at = $2 \
             WHERE batch_id = $1",
        )
        .bind(Uuid::from(batch_id))
        .bind(confirmed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(PayoutBatch {
            status: BatchStatus::Confirmed,
            confirmed_at: Some(confirmed_at),
            ..batch
        })
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<BatchDetail, SettlementError> {
        let row = sqlx::query_as::<_, BatchRow>(&format!("{SELECT_BATCH} WHERE batch_id = $1"))
            .bind(Uuid::from(batch_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let Some(row) = row else {
            return Err(SettlementError::BatchNotFound(Uuid::from(batch_id)));
        };

        let share_ids = sqlx::query(
            "SELECT share_id FROM creator_shares WHERE batch_id = $1 ORDER BY created_at",
        )
        .bind(Uuid::from(batch_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?
        .into_iter()
        .map(|r| r.try_get::<Uuid, _>("share_id").map(ShareId::from_uuid))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(BatchDetail {
            batch: row.try_into()?,
            share_ids,
        })
    }

    async fn list_batches(
        &self,
        status: Option<BatchStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PayoutBatch>, SettlementError> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, BatchRow>(&format!(
                "{SELECT_BATCH} WHERE status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
            ))
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, BatchRow>(&format!(
                "{SELECT_BATCH} ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        rows.into_iter().map(PayoutBatch::try_from).collect()
    }

    async fn payout_stats(&self) -> Result<PayoutStats, SettlementError> {
        let (total_batches, draft_batches, confirmed_batches, confirmed_amount) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE status = 'draft'), \
                 COUNT(*) FILTER (WHERE status = 'confirmed'), \
                 COALESCE(SUM(total_amount) FILTER (WHERE status = 'confirmed'), 0)::BIGINT \
                 FROM payout_batches",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        let (payable_amount, held_amount) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT \
             COALESCE(SUM(amount) FILTER (WHERE status = 'payable' AND batch_id IS NULL), 0)::BIGINT, \
             COALESCE(SUM(amount) FILTER (WHERE status = 'held'), 0)::BIGINT \
             FROM creator_shares",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(PayoutStats {
            total_batches,
            draft_batches,
            confirmed_batches,
            confirmed_amount,
            payable_amount,
            held_amount,
        })
    }
}
