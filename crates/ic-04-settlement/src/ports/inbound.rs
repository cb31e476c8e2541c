//! # Inbound Ports
//!
//! API trait defining what the Settlement Reconciler can do.

use crate::domain::{BondBalance, SettlementError, SettlementOutcome};
use async_trait::async_trait;
use shared_types::{Address, ContractBinding, InvestmentId, OpportunityId, SettlementScheduler};

/// Settlement reconciler API - inbound port.
#[async_trait]
pub trait SettlementApi: Send + Sync {
    /// Mint a confirmed investment's bonds. At-least-once, deduplicated.
    async fn on_confirmed(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError>;

    /// Transfer minted bonds back to the treasury after a refund.
    async fn compensate(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError>;

    /// Operator re-mint. Ignores the sweep's attempt ceiling.
    async fn retry_mint(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError>;

    /// Re-queue failed mints and compensations. Returns the jobs queued.
    fn requeue_failed(&self, scheduler: &dyn SettlementScheduler) -> Result<usize, SettlementError>;

    /// Fresh on-chain balance of `holder` for an opportunity's contract.
    async fn get_bond_balance(
        &self,
        opportunity_id: OpportunityId,
        holder: Address,
    ) -> Result<BondBalance, SettlementError>;

    /// Deploy and bind the opportunity's bond contract.
    async fn deploy_contract(
        &self,
        opportunity_id: OpportunityId,
    ) -> Result<ContractBinding, SettlementError>;
}
