//! Admission Controller Service
//!
//! Admission is a soft check: it reads the opportunity and the remaining
//! capacity without reserving anything. The binding decision happens at
//! confirmation, inside the capacity ledger's critical section.

use crate::domain::{
    AdmissionError, AdmissionRequest, AdmissionResult, ConfirmationCheck, RecheckOptions,
};
use crate::ports::AdmissionApi;
use shared_types::{
    Amount, Investment, InvestmentId, InvestmentOpportunity, InvestmentStatus,
    OpportunityDirectory, OpportunityId, OpportunityStatus, SettlementRecord, TimeSource,
    Timestamp,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Admission controller over an opportunity directory.
pub struct AdmissionController<D>
where
    D: OpportunityDirectory,
{
    directory: Arc<D>,
    time_source: Arc<dyn TimeSource>,
}

impl<D> AdmissionController<D>
where
    D: OpportunityDirectory,
{
    /// Create a new controller.
    pub fn new(directory: Arc<D>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            directory,
            time_source,
        }
    }

    fn load(&self, id: &OpportunityId) -> AdmissionResult<InvestmentOpportunity> {
        self.directory
            .get(id)?
            .ok_or(AdmissionError::OpportunityNotFound(*id))
    }

    /// Invariant, status and closing-time gate shared by admission and
    /// confirmation.
    fn ensure_open(opportunity: &InvestmentOpportunity, now: Timestamp) -> AdmissionResult<()> {
        if let Some(reason) = opportunity.invariant_violation() {
            return Err(AdmissionError::OpportunityMisconfigured { reason });
        }
        if opportunity.status != OpportunityStatus::Active {
            return Err(AdmissionError::OpportunityNotActive {
                status: opportunity.status,
            });
        }
        if let Some(closes_at) = opportunity.closes_at.filter(|_| opportunity.is_expired(now)) {
            return Err(AdmissionError::OpportunityExpired { closes_at });
        }
        Ok(())
    }

    fn price(opportunity: &InvestmentOpportunity, bonds: u64) -> AdmissionResult<Amount> {
        opportunity
            .price_for(bonds)
            .ok_or(AdmissionError::AmountOverflow { bonds })
    }
}

impl<D> AdmissionApi for AdmissionController<D>
where
    D: OpportunityDirectory,
{
    fn admit(&self, request: AdmissionRequest) -> Result<Investment, AdmissionError> {
        if request.bonds == 0 {
            return Err(AdmissionError::InvalidBondCount(request.bonds));
        }
        if request.investor_id.0.trim().is_empty() {
            return Err(AdmissionError::InvalidRequest("investor id is empty".into()));
        }

        let now = self.time_source.now();
        let opportunity = self.load(&request.opportunity_id)?;
        Self::ensure_open(&opportunity, now)?;

        let amount = Self::price(&opportunity, request.bonds)?;
        let remaining = opportunity.remaining();
        if amount > remaining {
            debug!(
                "[ic-02] Rejected {} bonds on {}: {} > {} remaining",
                request.bonds, opportunity.id, amount, remaining
            );
            return Err(AdmissionError::ExceedsRemainingCapacity {
                remaining,
                attempted: amount,
            });
        }

        let investment = Investment {
            id: InvestmentId::new(),
            opportunity_id: opportunity.id,
            investor_id: request.investor_id,
            payment_method: request.payment_method,
            bonds: request.bonds,
            amount,
            status: InvestmentStatus::Pending,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
            failure_reason: None,
            settlement: SettlementRecord {
                wallet_address: request.wallet_address,
                ..SettlementRecord::default()
            },
        };

        info!(
            "[ic-02] Admitted {} ({} bonds, {}) on {}",
            investment.id, investment.bonds, investment.amount, opportunity.id
        );
        Ok(investment)
    }

    fn recheck_for_confirmation(
        &self,
        investment: &Investment,
        options: RecheckOptions,
    ) -> Result<ConfirmationCheck, AdmissionError> {
        let opportunity = self.load(&investment.opportunity_id)?;
        Self::ensure_open(&opportunity, self.time_source.now())?;

        let recomputed = Self::price(&opportunity, investment.bonds)?;
        let drift = recomputed.abs_diff(investment.amount);
        if drift > options.amount_drift_tolerance {
            if !options.accept_amount_drift {
                return Err(AdmissionError::AmountDrift {
                    snapshot: investment.amount,
                    recomputed,
                    tolerance: options.amount_drift_tolerance,
                });
            }
            info!(
                "[ic-02] Operator accepted drift on {}: snapshot {}, now {}",
                investment.id, investment.amount, recomputed
            );
        }

        Ok(ConfirmationCheck {
            opportunity,
            recomputed_amount: recomputed,
        })
    }
}
