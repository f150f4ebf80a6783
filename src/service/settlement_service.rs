//! Settlement service: validate, calculate, persist.
//!
//! Every ingest follows the same pattern: validate the request before any
//! side effect, compute the allocation with the pure calc core, run the
//! conservation check, then write everything in one atomic store call.
//! Calculation-time failures never touch the store.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::calc::{RateCard, calculate, calculate_reversal};
use crate::config::Toggles;
use crate::domain::{
    Allocation, BatchDetail, BatchId, BatchStatus, CalcInput, CreatorHistoryEntry, CreatorId,
    CreatorShare, CreatorSummary, EventId, EventType, GrowthBucket, GrowthShare,
    NewSettlementEvent, PayoutBatch, PayoutStats, ReferrerSummary, ReleaseOutcome,
    RiskLedgerEntry, SettlementEvent, ShareChannel, ShareStatus,
};
use crate::error::SettlementError;
use crate::persistence::SettlementStore;

/// Result of ingesting a settlement event.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The stored (or replayed) event with its derived amounts.
    pub event: SettlementEvent,
    /// The allocation computed for the event.
    pub allocation: Allocation,
    /// True when an idempotency key matched a previously stored event and
    /// nothing new was persisted.
    pub replayed: bool,
}

/// Orchestration layer for settlement operations.
///
/// Stateless coordinator over the store seam: reads pass straight
/// through, mutations follow validate → calculate → check → persist.
#[derive(Debug, Clone)]
pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
    rates: RateCard,
    hold_days: i64,
}

impl SettlementService {
    /// Creates a new service over the given store.
    ///
    /// `hold_days` is the review window for positive shares; `0` disables
    /// the hold queue entirely.
    #[must_use]
    pub fn new(store: Arc<dyn SettlementStore>, hold_days: i64) -> Self {
        Self {
            store,
            rates: RateCard::default(),
            hold_days,
        }
    }

    /// Ingests a settlement event: forward `PAYMENT` or one of the
    /// reversal types.
    ///
    /// A repeated PAYMENT idempotency key replays the stored event
    /// without writing anything new. Reversals must reference a stored
    /// PAYMENT, quote its gross amount, and are deduplicated per
    /// `(original_event_id, event_type)`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ToggleDisabled`] when ingest is
    /// switched off, a validation error for malformed requests,
    /// [`SettlementError::DuplicateReversal`] for a repeated reversal, or
    /// a persistence error from the store.
    pub async fn ingest(
        &self,
        request: NewSettlementEvent,
        toggles: Toggles,
    ) -> Result<IngestOutcome, SettlementError> {
        if !toggles.ingest {
            return Err(SettlementError::ToggleDisabled("ingest"));
        }
        let event_type = EventType::from_str(&request.event_type)?;
        validate_amounts(&request)?;

        if event_type.is_reversal() {
            self.ingest_reversal(request, event_type, toggles).await
        } else {
            self.ingest_payment(request, toggles).await
        }
    }

    async fn ingest_payment(
        &self,
        request: NewSettlementEvent,
        toggles: Toggles,
    ) -> Result<IngestOutcome, SettlementError> {
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(stored) = self.store.find_event_by_idempotency_key(key).await? {
                // Deterministic recompute from the stored parameters.
                let allocation = calculate(&CalcInput::from(&stored), &self.rates);
                tracing::info!(event_id = %stored.event_id, key, "idempotent replay");
                return Ok(IngestOutcome {
                    event: stored,
                    allocation,
                    replayed: true,
                });
            }
        }

        let input = CalcInput {
            gross_amount: request.gross_amount,
            coupon_amount: request.coupon_amount,
            remix_chain: request.remix_chain.clone(),
            referrer_id: request.referrer_id.clone(),
        };
        let allocation = calculate(&input, &self.rates);
        self.check_balanced(&allocation)?;

        let occurred_at = request.occurred_at.unwrap_or_else(Utc::now);
        let event = forward_event(&allocation, &request, occurred_at);
        self.persist(event, allocation, toggles).await
    }

    async fn ingest_reversal(
        &self,
        request: NewSettlementEvent,
        event_type: EventType,
        toggles: Toggles,
    ) -> Result<IngestOutcome, SettlementError> {
        let original = self.resolve_original(&request).await?;
        if self
            .store
            .find_reversal(original.event_id, event_type)
            .await?
            .is_some()
        {
            return Err(SettlementError::DuplicateReversal {
                original_event_id: Uuid::from(original.event_id),
                event_type: event_type.as_str().to_string(),
            });
        }

        let allocation = calculate_reversal(
            &CalcInput::from(&original),
            request.reversal_amount,
            &self.rates,
        )?;
        self.check_balanced(&allocation)?;

        let occurred_at = request.occurred_at.unwrap_or_else(Utc::now);
        let event = reversal_event(event_type, &allocation, &original, occurred_at);
        self.persist(event, allocation, toggles).await
    }

    /// Computes the allocation for a request without persisting anything.
    ///
    /// Reversal previews resolve the original payment from the store the
    /// same way ingestion does, but skip the duplicate check.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`Self::ingest`].
    pub async fn preview(
        &self,
        request: NewSettlementEvent,
    ) -> Result<Allocation, SettlementError> {
        let event_type = EventType::from_str(&request.event_type)?;
        validate_amounts(&request)?;

        if event_type.is_reversal() {
            let original = self.resolve_original(&request).await?;
            calculate_reversal(
                &CalcInput::from(&original),
                request.reversal_amount,
                &self.rates,
            )
        } else {
            let input = CalcInput {
                gross_amount: request.gross_amount,
                coupon_amount: request.coupon_amount,
                remix_chain: request.remix_chain.clone(),
                referrer_id: request.referrer_id.clone(),
            };
            Ok(calculate(&input, &self.rates))
        }
    }

    /// Fetches a stored settlement event.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::EventNotFound`] for an unknown id or a
    /// persistence error.
    pub async fn get_event(&self, event_id: EventId) -> Result<SettlementEvent, SettlementError> {
        self.store.get_event(event_id).await
    }

    /// Releases every held share whose hold window has expired.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn release_held_shares(&self) -> Result<ReleaseOutcome, SettlementError> {
        let outcome = self.store.release_held_shares(Utc::now()).await?;
        tracing::info!(
            creator_released = outcome.creator_shares.len(),
            growth_released = outcome.growth_released,
            "expired holds released"
        );
        Ok(outcome)
    }

    /// Creates a draft payout batch claiming every eligible payable
    /// creator share.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ToggleDisabled`] when payouts are off,
    /// [`SettlementError::NoPayableShares`] when nothing is eligible, or
    /// a persistence error.
    pub async fn create_batch(
        &self,
        batch_date: Option<DateTime<Utc>>,
        toggles: Toggles,
    ) -> Result<BatchDetail, SettlementError> {
        if !toggles.payout {
            return Err(SettlementError::ToggleDisabled("payout"));
        }
        let detail = self
            .store
            .create_batch(batch_date.unwrap_or_else(Utc::now))
            .await?;
        tracing::info!(
            batch_id = %detail.batch.batch_id,
            total_amount = detail.batch.total_amount,
            share_count = detail.batch.share_count,
            "payout batch created"
        );
        Ok(detail)
    }

    /// Confirms a payout batch, marking every claimed share `paid`.
    ///
    /// Idempotent: confirming an already-confirmed batch returns the
    /// stored batch unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ToggleDisabled`] when payouts are off,
    /// [`SettlementError::BatchNotFound`] for an unknown id, or a
    /// persistence error.
    pub async fn confirm_batch(
        &self,
        batch_id: BatchId,
        toggles: Toggles,
    ) -> Result<PayoutBatch, SettlementError> {
        if !toggles.payout {
            return Err(SettlementError::ToggleDisabled("payout"));
        }
        let batch = self.store.confirm_batch(batch_id).await?;
        tracing::info!(
            batch_id = %batch.batch_id,
            total_amount = batch.total_amount,
            "payout batch confirmed"
        );
        Ok(batch)
    }

    /// Fetches a batch together with its claimed share ids.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BatchNotFound`] for an unknown id or a
    /// persistence error.
    pub async fn get_batch(&self, batch_id: BatchId) -> Result<BatchDetail, SettlementError> {
        self.store.get_batch(batch_id).await
    }

    /// Lists batches, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn list_batches(
        &self,
        status: Option<BatchStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PayoutBatch>, SettlementError> {
        self.store.list_batches(status, limit, offset).await
    }

    /// Aggregate payout stats together with the current risk reserve
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn stats(&self) -> Result<(PayoutStats, i64), SettlementError> {
        let payout = self.store.payout_stats().await?;
        let risk_balance = self.store.risk_pool_balance().await?;
        Ok((payout, risk_balance))
    }

    /// Aggregated settlement position of one creator.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn creator_summary(
        &self,
        creator_id: &CreatorId,
    ) -> Result<CreatorSummary, SettlementError> {
        self.store.creator_summary(creator_id).await
    }

    /// One creator's share history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn creator_history(
        &self,
        creator_id: &CreatorId,
        status: Option<ShareStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreatorHistoryEntry>, SettlementError> {
        self.store
            .creator_history(creator_id, status, limit, offset)
            .await
    }

    /// Aggregated growth position of one referrer.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn referrer_summary(
        &self,
        referrer_id: &CreatorId,
    ) -> Result<ReferrerSummary, SettlementError> {
        self.store.referrer_summary(referrer_id).await
    }

    /// Current risk reserve balance.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    pub async fn risk_pool_balance(&self) -> Result<i64, SettlementError> {
        self.store.risk_pool_balance().await
    }

    /// Resolves and validates the original payment a reversal references.
    async fn resolve_original(
        &self,
        request: &NewSettlementEvent,
    ) -> Result<SettlementEvent, SettlementError> {
        let Some(original_id) = request.original_event_id else {
            return Err(SettlementError::InvalidRequest(
                "original_event_id is required for reversal events".to_string(),
            ));
        };
        let original = self.store.get_event(original_id).await?;
        if original.event_type != EventType::Payment {
            return Err(SettlementError::InvalidRequest(
                "original_event_id must reference a PAYMENT event".to_string(),
            ));
        }
        // Quoting the original's gross guards against wrong-event ids.
        if original.gross_amount != request.gross_amount {
            return Err(SettlementError::InvalidRequest(format!(
                "gross_amount {} does not match the original payment's {}",
                request.gross_amount, original.gross_amount
            )));
        }
        Ok(original)
    }

    fn check_balanced(&self, allocation: &Allocation) -> Result<(), SettlementError> {
        if let Err(e) = allocation.ensure_balanced() {
            tracing::error!(
                diff = allocation.validation.balance_diff,
                gross_amount = allocation.gross_amount,
                coupon_amount = allocation.coupon_amount,
                "allocation failed balance conservation"
            );
            return Err(e);
        }
        Ok(())
    }

    async fn persist(
        &self,
        event: SettlementEvent,
        allocation: Allocation,
        toggles: Toggles,
    ) -> Result<IngestOutcome, SettlementError> {
        let (creator_shares, growth_shares, risk_entry) = if toggles.allocations {
            self.build_shares(&event, &allocation)
        } else {
            (Vec::new(), Vec::new(), None)
        };
        self.store
            .record_event(&event, &creator_shares, &growth_shares, risk_entry.as_ref())
            .await?;

        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            paid_amount = event.paid_amount,
            creator_shares = creator_shares.len(),
            growth_shares = growth_shares.len(),
            "settlement event recorded"
        );
        Ok(IngestOutcome {
            event,
            allocation,
            replayed: false,
        })
    }

    /// Materializes the ledger rows for an allocation.
    ///
    /// Curation is not materialized: the event contract carries no payee
    /// for it. Zero amounts produce no rows.
    fn build_shares(
        &self,
        event: &SettlementEvent,
        allocation: &Allocation,
    ) -> (Vec<CreatorShare>, Vec<GrowthShare>, Option<RiskLedgerEntry>) {
        let mut creator_shares = Vec::new();
        if let Some(root) = &event.creator_root_id {
            let amount = allocation.creator_breakdown.original;
            if amount != 0 {
                let (status, hold_until) = self.share_state(amount, event.occurred_at);
                creator_shares.push(CreatorShare::new(
                    event.event_id,
                    root.clone(),
                    ShareChannel::Original,
                    None,
                    amount,
                    status,
                    hold_until,
                ));
            }
        }
        for remix in &allocation.creator_breakdown.remix_shares {
            if remix.amount != 0 {
                let (status, hold_until) = self.share_state(remix.amount, event.occurred_at);
                creator_shares.push(CreatorShare::new(
                    event.event_id,
                    remix.creator_id.clone(),
                    ShareChannel::Remix,
                    Some(remix.depth),
                    remix.amount,
                    status,
                    hold_until,
                ));
            }
        }

        let mut growth_shares = Vec::new();
        let growth = &allocation.growth_breakdown;
        for (bucket, referrer_id, amount) in [
            (GrowthBucket::Referrer, growth.referrer_id.clone(), growth.referrer),
            (GrowthBucket::Campaign, None, growth.campaign),
            (GrowthBucket::Reserve, None, growth.reserve),
        ] {
            if amount != 0 {
                let (status, hold_until) = self.share_state(amount, event.occurred_at);
                growth_shares.push(GrowthShare::new(
                    event.event_id,
                    bucket,
                    referrer_id,
                    amount,
                    status,
                    hold_until,
                ));
            }
        }

        let risk_entry = (allocation.pools.risk != 0).then(|| RiskLedgerEntry {
            event_id: event.event_id,
            event_type: event.event_type,
            amount: allocation.pools.risk,
            created_at: Utc::now(),
        });

        (creator_shares, growth_shares, risk_entry)
    }

    /// Hold policy: positive shares wait out the review window; negative
    /// (clawback) shares are immediately payable so they net into the
    /// next batch.
    fn share_state(
        &self,
        amount: i64,
        occurred_at: DateTime<Utc>,
    ) -> (ShareStatus, Option<DateTime<Utc>>) {
        if amount > 0 && self.hold_days > 0 {
            (
                ShareStatus::Held,
                Some(occurred_at + Duration::days(self.hold_days)),
            )
        } else {
            (ShareStatus::Payable, None)
        }
    }
}

fn validate_amounts(request: &NewSettlementEvent) -> Result<(), SettlementError> {
    if request.gross_amount <= 0 {
        return Err(SettlementError::InvalidRequest(
            "gross_amount must be positive".to_string(),
        ));
    }
    if request.coupon_amount < 0 || request.coupon_amount > request.gross_amount {
        return Err(SettlementError::InvalidRequest(
            "coupon_amount must be between 0 and gross_amount".to_string(),
        ));
    }
    Ok(())
}

/// Builds the event row for a forward payment.
fn forward_event(
    allocation: &Allocation,
    request: &NewSettlementEvent,
    occurred_at: DateTime<Utc>,
) -> SettlementEvent {
    SettlementEvent {
        event_id: EventId::new(),
        event_type: EventType::Payment,
        gross_amount: allocation.gross_amount,
        coupon_amount: allocation.coupon_amount,
        paid_amount: allocation.paid_amount,
        pg_fee: allocation.pg_fee,
        net_cash: allocation.net_cash,
        anchor_amount: allocation.anchor_amount,
        remix_chain: truncated_chain(allocation),
        referrer_id: allocation.growth_breakdown.referrer_id.clone(),
        creator_root_id: request.creator_root_id.clone(),
        template_id: request.template_id.clone(),
        artifact_id: request.artifact_id.clone(),
        buyer_user_id: request.buyer_user_id.clone(),
        original_event_id: None,
        reversal_amount: None,
        idempotency_key: request.idempotency_key.clone(),
        occurred_at,
        created_at: Utc::now(),
    }
}

/// Builds the event row for a reversal.
///
/// Split parameters and linkage echo the original payment; the derived
/// amounts carry the scaled, negated values. Reversals are deduplicated
/// by `(original_event_id, event_type)`, so the request's idempotency key
/// is not carried.
fn reversal_event(
    event_type: EventType,
    allocation: &Allocation,
    original: &SettlementEvent,
    occurred_at: DateTime<Utc>,
) -> SettlementEvent {
    SettlementEvent {
        event_id: EventId::new(),
        event_type,
        gross_amount: allocation.gross_amount,
        coupon_amount: allocation.coupon_amount,
        paid_amount: allocation.paid_amount,
        pg_fee: allocation.pg_fee,
        net_cash: allocation.net_cash,
        anchor_amount: allocation.anchor_amount,
        remix_chain: truncated_chain(allocation),
        referrer_id: allocation.growth_breakdown.referrer_id.clone(),
        creator_root_id: original.creator_root_id.clone(),
        template_id: original.template_id.clone(),
        artifact_id: original.artifact_id.clone(),
        buyer_user_id: original.buyer_user_id.clone(),
        original_event_id: Some(original.event_id),
        reversal_amount: allocation.reversal.map(|r| r.reversed_amount),
        idempotency_key: None,
        occurred_at,
        created_at: Utc::now(),
    }
}

/// The chain the calculation actually used, already capped at the depth
/// limit.
fn truncated_chain(allocation: &Allocation) -> Vec<CreatorId> {
    allocation
        .creator_breakdown
        .remix_shares
        .iter()
        .map(|share| share.creator_id.clone())
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn make_service(hold_days: i64) -> SettlementService {
        SettlementService::new(Arc::new(MemoryStore::new()), hold_days)
    }

    fn all_on() -> Toggles {
        Toggles::default()
    }

    fn payment_request(gross: i64, coupon: i64) -> NewSettlementEvent {
        NewSettlementEvent {
            event_type: "PAYMENT".to_string(),
            gross_amount: gross,
            coupon_amount: coupon,
            remix_chain: vec![],
            referrer_id: None,
            creator_root_id: Some(CreatorId::from("creator_a")),
            template_id: None,
            artifact_id: Some("artifact_1".to_string()),
            buyer_user_id: None,
            original_event_id: None,
            reversal_amount: None,
            idempotency_key: None,
            occurred_at: None,
        }
    }

    fn reversal_request(
        event_type: &str,
        original: EventId,
        gross: i64,
        amount: Option<i64>,
    ) -> NewSettlementEvent {
        NewSettlementEvent {
            event_type: event_type.to_string(),
            original_event_id: Some(original),
            reversal_amount: amount,
            creator_root_id: None,
            artifact_id: None,
            ..payment_request(gross, 0)
        }
    }

    async fn ingest_ok(service: &SettlementService, request: NewSettlementEvent) -> IngestOutcome {
        match service.ingest(request, all_on()).await {
            Ok(outcome) => outcome,
            Err(e) => panic!("ingest should succeed: {e}"),
        }
    }

    #[tokio::test]
    async fn payment_ingest_materializes_the_full_ledger() {
        let service = make_service(0);
        let mut request = payment_request(10_000, 0);
        request.remix_chain = vec![CreatorId::from("creator_p1")];
        request.referrer_id = Some(CreatorId::from("ref_1"));

        let outcome = ingest_ok(&service, request).await;
        assert!(!outcome.replayed);
        assert_eq!(outcome.allocation.pools.platform_actual, 5_307);
        assert_eq!(outcome.allocation.pools.creator, 2_895);
        assert_eq!(outcome.allocation.pools.growth, 965);
        assert_eq!(outcome.allocation.pools.risk, 483);
        assert_eq!(outcome.event.paid_amount, 10_000);
        assert_eq!(outcome.event.remix_chain, vec![CreatorId::from("creator_p1")]);

        let Ok(root) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(root.payable_amount, 2_027);

        let Ok(remixer) = service.creator_summary(&CreatorId::from("creator_p1")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(remixer.payable_amount, 579);
        assert_eq!(remixer.remix_amount, 579);

        let Ok(referrer) = service.referrer_summary(&CreatorId::from("ref_1")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(referrer.total_amount, 676);
        assert_eq!(referrer.event_count, 1);

        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 483);
    }

    #[tokio::test]
    async fn ingest_toggle_off_fails_fast() {
        let service = make_service(0);
        let toggles = Toggles {
            ingest: false,
            ..Toggles::default()
        };
        let result = service.ingest(payment_request(10_000, 0), toggles).await;
        assert!(matches!(result, Err(SettlementError::ToggleDisabled("ingest"))));

        // Nothing reached the store.
        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 0);
    }

    #[tokio::test]
    async fn unknown_event_type_is_rejected() {
        let service = make_service(0);
        let mut request = payment_request(10_000, 0);
        request.event_type = "TRANSFER".to_string();
        assert!(matches!(
            service.ingest(request, all_on()).await,
            Err(SettlementError::InvalidEventType(_))
        ));
    }

    #[tokio::test]
    async fn amount_validation_rejects_bad_inputs() {
        let service = make_service(0);
        assert!(matches!(
            service.ingest(payment_request(0, 0), all_on()).await,
            Err(SettlementError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.ingest(payment_request(-5, 0), all_on()).await,
            Err(SettlementError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.ingest(payment_request(100, 101), all_on()).await,
            Err(SettlementError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.ingest(payment_request(100, -1), all_on()).await,
            Err(SettlementError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn idempotency_key_replays_without_new_writes() {
        let service = make_service(0);
        let mut request = payment_request(10_000, 0);
        request.idempotency_key = Some("order-42".to_string());

        let first = ingest_ok(&service, request.clone()).await;
        assert!(!first.replayed);

        let replay = ingest_ok(&service, request).await;
        assert!(replay.replayed);
        assert_eq!(replay.event.event_id, first.event.event_id);
        assert_eq!(replay.allocation, first.allocation);

        // The second call persisted nothing.
        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.total_amount, 2_027);
        assert_eq!(summary.share_count, 1);
        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 483);
    }

    #[tokio::test]
    async fn allocations_toggle_off_records_event_only() {
        let service = make_service(0);
        let toggles = Toggles {
            allocations: false,
            ..Toggles::default()
        };
        let Ok(outcome) = service.ingest(payment_request(10_000, 0), toggles).await else {
            panic!("ingest should succeed");
        };

        let Ok(stored) = service.get_event(outcome.event.event_id).await else {
            panic!("event row should exist");
        };
        assert_eq!(stored.net_cash, 9_650);

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.share_count, 0);
        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 0);
    }

    #[tokio::test]
    async fn hold_window_gates_release() {
        let service = make_service(14);

        let mut aged = payment_request(10_000, 0);
        aged.occurred_at = Some(Utc::now() - Duration::days(15));
        ingest_ok(&service, aged).await;

        let fresh = payment_request(10_000, 0);
        ingest_ok(&service, fresh).await;

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.held_amount, 4_054);
        assert_eq!(summary.payable_amount, 0);

        let Ok(outcome) = service.release_held_shares().await else {
            panic!("release should succeed");
        };
        // Only the aged payment's shares expired.
        assert_eq!(outcome.creator_shares.len(), 1);
        assert_eq!(outcome.growth_released, 1);

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.held_amount, 2_027);
        assert_eq!(summary.payable_amount, 2_027);
    }

    #[tokio::test]
    async fn full_refund_negates_the_original() {
        let service = make_service(14);
        let payment = ingest_ok(&service, payment_request(10_000, 0)).await;

        let refund = ingest_ok(
            &service,
            reversal_request("REFUND", payment.event.event_id, 10_000, None),
        )
        .await;
        assert_eq!(refund.event.event_type, EventType::Refund);
        assert_eq!(refund.event.paid_amount, -10_000);
        assert_eq!(refund.event.reversal_amount, Some(10_000));
        assert_eq!(refund.event.gross_amount, 10_000);
        assert_eq!(refund.allocation.pools.platform_actual, -5_307);
        assert_eq!(refund.allocation.pools.risk, -483);

        // The clawback skips the hold queue; the original is still held.
        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.held_amount, 2_027);
        assert_eq!(summary.payable_amount, -2_027);
        assert_eq!(summary.total_amount, 0);

        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 0);
    }

    #[tokio::test]
    async fn partial_refund_scales_every_ledger_row() {
        let service = make_service(0);
        let mut request = payment_request(20_000, 0);
        request.remix_chain = vec![CreatorId::from("creator_p1")];
        request.referrer_id = Some(CreatorId::from("ref_9"));
        let payment = ingest_ok(&service, request).await;
        assert_eq!(payment.allocation.pools.creator, 5_790);

        let refund = ingest_ok(
            &service,
            reversal_request("REFUND", payment.event.event_id, 20_000, Some(6_500)),
        )
        .await;
        assert_eq!(refund.allocation.pg_fee, -228);
        assert_eq!(refund.allocation.net_cash, -6_272);
        assert_eq!(refund.allocation.pools.creator, -1_882);
        assert_eq!(refund.allocation.pools.growth, -627);
        assert_eq!(refund.allocation.pools.risk, -314);
        assert_eq!(refund.allocation.pools.platform_actual, -3_449);

        let Ok(root) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(root.payable_amount, 4_053 - 1_317);

        let Ok(remixer) = service.creator_summary(&CreatorId::from("creator_p1")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(remixer.payable_amount, 1_158 - 376);

        let Ok(referrer) = service.referrer_summary(&CreatorId::from("ref_9")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(referrer.total_amount, 1_351 - 439);

        let Ok(risk) = service.risk_pool_balance().await else {
            panic!("balance should succeed");
        };
        assert_eq!(risk, 965 - 314);
    }

    #[tokio::test]
    async fn reversal_validation_guards() {
        let service = make_service(0);
        let payment = ingest_ok(&service, payment_request(10_000, 0)).await;
        let payment_id = payment.event.event_id;

        // Missing original reference.
        let mut request = reversal_request("REFUND", payment_id, 10_000, None);
        request.original_event_id = None;
        assert!(matches!(
            service.ingest(request, all_on()).await,
            Err(SettlementError::InvalidRequest(_))
        ));

        // Unknown original.
        assert!(matches!(
            service
                .ingest(reversal_request("REFUND", EventId::new(), 10_000, None), all_on())
                .await,
            Err(SettlementError::EventNotFound(_))
        ));

        // Gross quote mismatch.
        assert!(matches!(
            service
                .ingest(reversal_request("REFUND", payment_id, 9_999, None), all_on())
                .await,
            Err(SettlementError::InvalidRequest(_))
        ));

        // Out-of-range amounts.
        assert!(matches!(
            service
                .ingest(reversal_request("REFUND", payment_id, 10_000, Some(0)), all_on())
                .await,
            Err(SettlementError::InvalidReversalAmount { .. })
        ));
        assert!(matches!(
            service
                .ingest(
                    reversal_request("REFUND", payment_id, 10_000, Some(10_001)),
                    all_on()
                )
                .await,
            Err(SettlementError::InvalidReversalAmount { .. })
        ));

        // A reversal cannot reference another reversal.
        let refund = ingest_ok(
            &service,
            reversal_request("REFUND", payment_id, 10_000, Some(1_000)),
        )
        .await;
        assert!(matches!(
            service
                .ingest(
                    reversal_request("CHARGEBACK", refund.event.event_id, 10_000, None),
                    all_on()
                )
                .await,
            Err(SettlementError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn one_reversal_per_type_per_original() {
        let service = make_service(0);
        let payment = ingest_ok(&service, payment_request(10_000, 0)).await;
        let payment_id = payment.event.event_id;

        ingest_ok(&service, reversal_request("REFUND", payment_id, 10_000, Some(2_000))).await;
        assert!(matches!(
            service
                .ingest(
                    reversal_request("REFUND", payment_id, 10_000, Some(3_000)),
                    all_on()
                )
                .await,
            Err(SettlementError::DuplicateReversal { .. })
        ));

        // A different reversal type is still allowed.
        ingest_ok(
            &service,
            reversal_request("CHARGEBACK", payment_id, 10_000, Some(1_000)),
        )
        .await;
    }

    #[tokio::test]
    async fn preview_persists_nothing() {
        let service = make_service(0);
        let Ok(allocation) = service.preview(payment_request(10_000, 0)).await else {
            panic!("preview should succeed");
        };
        assert_eq!(allocation.pools.platform_actual, 5_307);
        assert!(allocation.validation.balance_check);

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.share_count, 0);

        // Reversal previews resolve the stored original.
        let payment = ingest_ok(&service, payment_request(10_000, 0)).await;
        let Ok(preview) = service
            .preview(reversal_request("REFUND", payment.event.event_id, 10_000, Some(5_000)))
            .await
        else {
            panic!("preview should succeed");
        };
        assert_eq!(preview.paid_amount, -5_000);
        assert_eq!(preview.pools.creator, -1_448);

        // And still persist nothing: the same refund can be ingested.
        ingest_ok(
            &service,
            reversal_request("REFUND", payment.event.event_id, 10_000, Some(5_000)),
        )
        .await;
    }

    #[tokio::test]
    async fn batch_lifecycle_end_to_end() {
        let service = make_service(0);
        for _ in 0..3 {
            ingest_ok(&service, payment_request(10_000, 0)).await;
        }

        let Ok(detail) = service.create_batch(None, all_on()).await else {
            panic!("batch creation should succeed");
        };
        assert_eq!(detail.batch.total_amount, 6_081);
        assert_eq!(detail.batch.share_count, 3);

        assert!(matches!(
            service.create_batch(None, all_on()).await,
            Err(SettlementError::NoPayableShares)
        ));

        let Ok(confirmed) = service.confirm_batch(detail.batch.batch_id, all_on()).await else {
            panic!("confirmation should succeed");
        };
        assert_eq!(confirmed.status, BatchStatus::Confirmed);

        let Ok(again) = service.confirm_batch(detail.batch.batch_id, all_on()).await else {
            panic!("repeat confirmation should succeed");
        };
        assert_eq!(again.confirmed_at, confirmed.confirmed_at);

        let Ok((stats, risk_balance)) = service.stats().await else {
            panic!("stats should succeed");
        };
        assert_eq!(stats.total_batches, 1);
        assert_eq!(stats.confirmed_batches, 1);
        assert_eq!(stats.confirmed_amount, 6_081);
        assert_eq!(stats.payable_amount, 0);
        assert_eq!(risk_balance, 3 * 483);

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.paid_amount, 6_081);
    }

    #[tokio::test]
    async fn payout_toggle_blocks_batching() {
        let service = make_service(0);
        ingest_ok(&service, payment_request(10_000, 0)).await;
        let toggles = Toggles {
            payout: false,
            ..Toggles::default()
        };
        assert!(matches!(
            service.create_batch(None, toggles).await,
            Err(SettlementError::ToggleDisabled("payout"))
        ));
        assert!(matches!(
            service.confirm_batch(BatchId::new(), toggles).await,
            Err(SettlementError::ToggleDisabled("payout"))
        ));
    }

    #[tokio::test]
    async fn growth_shares_are_never_batched() {
        let service = make_service(0);
        let mut request = payment_request(10_000, 0);
        request.creator_root_id = None;
        request.referrer_id = Some(CreatorId::from("ref_1"));
        ingest_ok(&service, request).await;

        // Growth money is payable, but batches claim creator shares only.
        let Ok(referrer) = service.referrer_summary(&CreatorId::from("ref_1")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(referrer.payable_amount, 676);
        assert!(matches!(
            service.create_batch(None, all_on()).await,
            Err(SettlementError::NoPayableShares)
        ));
    }

    #[tokio::test]
    async fn refund_after_payout_nets_into_next_batch() {
        let service = make_service(0);
        let payment = ingest_ok(&service, payment_request(10_000, 0)).await;

        let Ok(detail) = service.create_batch(None, all_on()).await else {
            panic!("batch creation should succeed");
        };
        let Ok(_) = service.confirm_batch(detail.batch.batch_id, all_on()).await else {
            panic!("confirmation should succeed");
        };

        ingest_ok(
            &service,
            reversal_request("REFUND", payment.event.event_id, 10_000, None),
        )
        .await;

        let Ok(summary) = service.creator_summary(&CreatorId::from("creator_a")).await else {
            panic!("summary should succeed");
        };
        assert_eq!(summary.paid_amount, 2_027);
        assert_eq!(summary.payable_amount, -2_027);
        assert_eq!(summary.total_amount, 0);

        // The clawback is claimable by the next batch, netting it negative.
        let Ok(clawback_batch) = service.create_batch(None, all_on()).await else {
            panic!("batch creation should succeed");
        };
        assert_eq!(clawback_batch.batch.total_amount, -2_027);
    }
}
