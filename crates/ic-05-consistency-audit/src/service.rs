//! Consistency Auditor Service
//!
//! Walks confirmed investments that carry a wallet, queries each wallet's
//! balance once per opportunity, and classifies every investment against
//! its wallet position. Nothing is written back.

use crate::domain::{
    AuditConfig, AuditCounts, AuditError, AuditReport, AuditResult, ChainReconciliationRecord,
    WalletPosition,
};
use crate::ports::{AuditApi, BalanceReader};
use async_trait::async_trait;
use shared_bus::{EventPublisher, PlatformEvent};
use shared_types::{
    to_hex, Address, Investment, InvestmentOpportunity, InvestmentRepository, InvestmentStatus,
    OpportunityDirectory, OpportunityId, TimeSource,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only ledger/chain auditor.
pub struct ConsistencyAuditor<D, R>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
{
    config: AuditConfig,
    directory: Arc<D>,
    repository: Arc<R>,
    balances: Arc<dyn BalanceReader>,
    events: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
}

impl<D, R> ConsistencyAuditor<D, R>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
{
    /// Create a new auditor.
    pub fn new(
        config: AuditConfig,
        directory: Arc<D>,
        repository: Arc<R>,
        balances: Arc<dyn BalanceReader>,
        events: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            directory,
            repository,
            balances,
            events,
            time_source,
        }
    }

    fn targets(&self, opportunity_id: Option<OpportunityId>) -> AuditResult<Vec<InvestmentOpportunity>> {
        match opportunity_id {
            Some(id) => {
                let opportunity = self
                    .directory
                    .get(&id)?
                    .ok_or(AuditError::OpportunityNotFound(id))?;
                Ok(vec![opportunity])
            }
            None => Ok(self.directory.list()?),
        }
    }

    /// Confirmed investments with a wallet, grouped by wallet.
    fn wallets(&self, opportunity: &InvestmentOpportunity) -> AuditResult<BTreeMap<Address, Vec<Investment>>> {
        let mut wallets: BTreeMap<Address, Vec<Investment>> = BTreeMap::new();
        for investment in self.repository.list_by_opportunity(&opportunity.id)? {
            if investment.status != InvestmentStatus::Confirmed {
                continue;
            }
            if let Some(wallet) = investment.settlement.wallet_address {
                wallets.entry(wallet).or_default().push(investment);
            }
        }
        Ok(wallets)
    }

    async fn audit_opportunity(
        &self,
        opportunity: &InvestmentOpportunity,
    ) -> AuditResult<Vec<ChainReconciliationRecord>> {
        let wallets = self.wallets(opportunity)?;
        let mut records = Vec::new();

        // A deactivated contract still holds what was minted on it
        if opportunity.contract.is_none() {
            for (wallet, investments) in &wallets {
                records.extend(
                    investments
                        .iter()
                        .map(|i| ChainReconciliationRecord::no_contract(i, *wallet)),
                );
            }
            return Ok(records);
        }

        for (wallet, investments) in wallets {
            let observed = self.balances.bond_balance(opportunity.id, wallet).await;
            let position = WalletPosition::of(wallet, &investments, observed);
            let now = self.time_source.now();
            for investment in &investments {
                records.push(ChainReconciliationRecord::classify(
                    investment,
                    &position,
                    now,
                    &self.config,
                ));
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl<D, R> AuditApi for ConsistencyAuditor<D, R>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
{
    async fn audit(
        &self,
        opportunity_id: Option<OpportunityId>,
    ) -> Result<AuditReport, AuditError> {
        let mut records = Vec::new();
        for opportunity in self.targets(opportunity_id)? {
            let found = self.audit_opportunity(&opportunity).await?;
            debug!("[ic-05] {} records for {}", found.len(), opportunity.id);
            records.extend(found);
        }

        let mut counts = AuditCounts::default();
        for record in &records {
            counts.record(record.classification);
            let Some(reason) = record.reason.as_ref().filter(|_| record.is_mismatch()) else {
                continue;
            };
            warn!(
                "[ic-05] Mismatch on {} (wallet {}): {}",
                record.investment_id,
                to_hex(&record.wallet_address),
                reason
            );
            self.events
                .publish(PlatformEvent::ReconciliationMismatch {
                    investment_id: record.investment_id,
                    opportunity_id: record.opportunity_id,
                    reason: reason.to_string(),
                })
                .await;
        }

        info!(
            "[ic-05] Audit done: {} matched, {} pending-mint, {} mismatched, {} no-contract",
            counts.matched, counts.pending_mint, counts.mismatched, counts.no_contract
        );
        self.events
            .publish(PlatformEvent::AuditCompleted {
                opportunity_id,
                matched: counts.matched,
                pending_mint: counts.pending_mint,
                mismatched: counts.mismatched,
                no_contract: counts.no_contract,
            })
            .await;

        Ok(AuditReport {
            opportunity_id,
            records,
            counts,
            generated_at: self.time_source.now(),
        })
    }
}
