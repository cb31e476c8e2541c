//! Investment Lifecycle Service
//!
//! Every transition is a status compare-and-set against the repository.
//! Transitions that move capacity run the compare-and-set inside the
//! capacity ledger's critical section, so funding and status never disagree.
//! Events are published and settlement jobs scheduled only after the
//! critical section has been left.

use crate::domain::{ConfirmOptions, LifecycleConfig, LifecycleError, LifecycleResult};
use crate::ports::LifecycleApi;
use async_trait::async_trait;
use ic_01_capacity_ledger::{CapacityLedger, CapacitySnapshot};
use ic_02_admission::{AdmissionApi, AdmissionController, AdmissionRequest};
use shared_bus::{EventPublisher, PlatformEvent};
use shared_types::{
    Investment, InvestmentId, InvestmentRepository, InvestmentStatus, OpportunityDirectory,
    OpportunityStatus, SettlementJob, SettlementScheduler, TimeSource, Timestamp,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle state machine over the shared stores.
pub struct LifecycleService<D, R>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
{
    config: LifecycleConfig,
    admission: Arc<AdmissionController<D>>,
    ledger: Arc<CapacityLedger<D>>,
    repository: Arc<R>,
    scheduler: Arc<dyn SettlementScheduler>,
    events: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
}

impl<D, R> LifecycleService<D, R>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
{
    /// Create a new lifecycle service.
    pub fn new(
        config: LifecycleConfig,
        admission: Arc<AdmissionController<D>>,
        ledger: Arc<CapacityLedger<D>>,
        repository: Arc<R>,
        scheduler: Arc<dyn SettlementScheduler>,
        events: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            admission,
            ledger,
            repository,
            scheduler,
            events,
            time_source,
        }
    }

    fn load(&self, id: InvestmentId) -> LifecycleResult<Investment> {
        self.repository
            .get(&id)?
            .ok_or(LifecycleError::InvestmentNotFound(id))
    }

    /// Copy of `investment` moved to `next`, or `InvalidTransition`.
    fn advanced(
        &self,
        investment: &Investment,
        next: InvestmentStatus,
        reason: Option<String>,
    ) -> LifecycleResult<Investment> {
        let mut updated = investment.clone();
        updated
            .transition_to(next, self.time_source.now())
            .map_err(|(from, to)| LifecycleError::InvalidTransition { from, to })?;
        if reason.is_some() {
            updated.failure_reason = reason;
        }
        Ok(updated)
    }

    /// Persist `updated` if the stored status is still `expected`.
    ///
    /// A lost race is reported against the status that won.
    fn commit(&self, expected: InvestmentStatus, updated: &Investment) -> LifecycleResult<()> {
        if self.repository.compare_and_set(expected, updated.clone())? {
            return Ok(());
        }
        let from = self
            .repository
            .get(&updated.id)?
            .map(|stored| stored.status)
            .unwrap_or(expected);
        Err(LifecycleError::InvalidTransition {
            from,
            to: updated.status,
        })
    }

    /// Status gate on the figures the ledger read under its lock. The
    /// admission recheck ran before the lock was taken.
    fn ensure_still_open(snapshot: &CapacitySnapshot, now: Timestamp) -> LifecycleResult<()> {
        if snapshot.accepts_investments(now) {
            return Ok(());
        }
        match snapshot.closes_at {
            Some(closes_at) if snapshot.status == OpportunityStatus::Active => {
                Err(LifecycleError::OpportunityExpired { closes_at })
            }
            _ => Err(LifecycleError::OpportunityNotActive {
                status: snapshot.status,
            }),
        }
    }

    fn schedule(&self, job: SettlementJob) {
        if !self.scheduler.schedule(job) {
            warn!(
                "[ic-03] Could not queue {:?}; left for the retry sweep",
                job
            );
        }
    }

    /// Release capacity and move a confirmed investment to `refunded`.
    async fn refund_confirmed(
        &self,
        investment: Investment,
        reason: Option<String>,
    ) -> LifecycleResult<Investment> {
        let refunded = self.advanced(&investment, InvestmentStatus::Refunded, reason)?;

        let (snapshot, ()) =
            self.ledger
                .release_with(&investment.opportunity_id, investment.amount, |_| {
                    self.commit(InvestmentStatus::Confirmed, &refunded)
                })?;

        // The worker skips compensation when nothing was minted
        if investment.settlement.wallet_address.is_some() {
            self.schedule(SettlementJob::Compensate(investment.id));
        }

        info!(
            "[ic-03] Refunded {} on {}, released {}",
            investment.id, investment.opportunity_id, investment.amount
        );
        self.events
            .publish(PlatformEvent::InvestmentRefunded {
                investment_id: investment.id,
                opportunity_id: investment.opportunity_id,
                released: investment.amount,
                current_funding: snapshot.current_funding,
            })
            .await;

        self.load(investment.id)
    }

    async fn reject_confirmation(&self, investment: &Investment, err: &LifecycleError) {
        warn!("[ic-03] Confirmation of {} rejected: {}", investment.id, err);
        self.events
            .publish(PlatformEvent::ConfirmationRejected {
                investment_id: investment.id,
                opportunity_id: investment.opportunity_id,
                reason: err.to_string(),
            })
            .await;
    }
}

#[async_trait]
impl<D, R> LifecycleApi for LifecycleService<D, R>
where
    D: OpportunityDirectory + 'static,
    R: InvestmentRepository + 'static,
{
    async fn submit(&self, request: AdmissionRequest) -> Result<Investment, LifecycleError> {
        let investment = self.admission.admit(request)?;
        self.repository.insert(investment.clone())?;

        self.events
            .publish(PlatformEvent::InvestmentAdmitted {
                investment_id: investment.id,
                opportunity_id: investment.opportunity_id,
                bonds: investment.bonds,
                amount: investment.amount,
            })
            .await;
        Ok(investment)
    }

    async fn confirm(
        &self,
        id: InvestmentId,
        options: ConfirmOptions,
    ) -> Result<Investment, LifecycleError> {
        let investment = self.load(id)?;
        let confirmed = self.advanced(&investment, InvestmentStatus::Confirmed, None)?;

        if let Err(e) = self
            .admission
            .recheck_for_confirmation(&investment, options.recheck(&self.config))
        {
            let err = LifecycleError::from(e);
            self.reject_confirmation(&investment, &err).await;
            return Err(err);
        }

        let now = self.time_source.now();
        let reserved = self
            .ledger
            .reserve_with(&investment.opportunity_id, investment.amount, |snapshot| {
                Self::ensure_still_open(snapshot, now)?;
                self.commit(InvestmentStatus::Pending, &confirmed)
            });
        let snapshot = match reserved {
            Ok((snapshot, ())) => snapshot,
            Err(err) => {
                self.reject_confirmation(&investment, &err).await;
                return Err(err);
            }
        };

        self.schedule(SettlementJob::Mint(id));

        info!(
            "[ic-03] Confirmed {} on {} ({} / {})",
            id, investment.opportunity_id, snapshot.current_funding, snapshot.cap
        );
        self.events
            .publish(PlatformEvent::InvestmentConfirmed {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                amount: investment.amount,
                current_funding: snapshot.current_funding,
                cap: snapshot.cap,
            })
            .await;

        self.load(id)
    }

    async fn cancel(&self, id: InvestmentId, reason: String) -> Result<Investment, LifecycleError> {
        let investment = self.load(id)?;

        if investment.status == InvestmentStatus::Confirmed {
            return self.refund_confirmed(investment, Some(reason)).await;
        }

        let cancelled = self.advanced(&investment, InvestmentStatus::Cancelled, Some(reason.clone()))?;
        self.commit(InvestmentStatus::Pending, &cancelled)?;

        info!("[ic-03] Cancelled {}: {}", id, reason);
        self.events
            .publish(PlatformEvent::InvestmentCancelled {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                reason,
            })
            .await;
        Ok(cancelled)
    }

    async fn refund(&self, id: InvestmentId) -> Result<Investment, LifecycleError> {
        let investment = self.load(id)?;
        self.refund_confirmed(investment, None).await
    }

    async fn fail(&self, id: InvestmentId, reason: String) -> Result<Investment, LifecycleError> {
        let investment = self.load(id)?;
        let failed = self.advanced(&investment, InvestmentStatus::Failed, Some(reason.clone()))?;
        self.commit(InvestmentStatus::Pending, &failed)?;

        warn!("[ic-03] Investment {} failed: {}", id, reason);
        self.events
            .publish(PlatformEvent::InvestmentFailed {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                reason,
            })
            .await;
        Ok(failed)
    }

    fn get(&self, id: InvestmentId) -> Result<Investment, LifecycleError> {
        self.load(id)
    }
}
