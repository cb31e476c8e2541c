//! Settlement Reconciler Service
//!
//! Chain work runs after the financial transition has committed and outside
//! every capacity lock. A failure here is recorded on the investment's
//! settlement mirror and never reverts the confirmation.
//!
//! Deduplication happens in three layers, checked in order:
//!
//! 1. the persisted `mint_tx_hash` / `compensation_tx_hash`
//! 2. the in-process completed map
//! 3. the in-flight set (a second job for a held key returns `InFlight`)
//!
//! The idempotency key is also passed to the gateway, which replays the
//! original receipt when a response was lost after the transaction executed.

use crate::domain::{
    token_balance_for, BondBalance, ChainError, DeployParams, SettlementConfig, SettlementError,
    SettlementOutcome, SettlementResult, SkipReason,
};
use crate::ports::{BlockchainGateway, SettlementApi};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventPublisher, PlatformEvent};
use shared_types::{
    to_hex, Address, ContractBinding, Hash, IdempotencyKey, Investment, InvestmentId,
    InvestmentOpportunity, InvestmentRepository, InvestmentStatus, OpportunityDirectory,
    OpportunityId, SettlementJob, SettlementScheduler, TimeSource,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gateway call being retried.
#[derive(Clone, Copy, Debug)]
enum ChainCall {
    Mint(InvestmentId),
    TransferBack(InvestmentId),
    Deploy(OpportunityId),
}

impl ChainCall {
    /// Investment and the status it must keep between attempts.
    fn guard(&self) -> Option<(InvestmentId, InvestmentStatus)> {
        match self {
            Self::Mint(id) => Some((*id, InvestmentStatus::Confirmed)),
            Self::TransferBack(id) => Some((*id, InvestmentStatus::Refunded)),
            Self::Deploy(_) => None,
        }
    }
}

impl fmt::Display for ChainCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint(id) => write!(f, "mint for {}", id),
            Self::TransferBack(id) => write!(f, "transfer-back for {}", id),
            Self::Deploy(id) => write!(f, "deploy for {}", id),
        }
    }
}

/// Removes its key from the in-flight set on drop.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<IdempotencyKey>>,
    key: IdempotencyKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/// Settlement reconciler over the shared stores and a chain gateway.
pub struct SettlementReconciler<D, R, G>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
    G: BlockchainGateway,
{
    config: SettlementConfig,
    directory: Arc<D>,
    repository: Arc<R>,
    gateway: Arc<G>,
    events: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    in_flight: Mutex<HashSet<IdempotencyKey>>,
    completed: RwLock<HashMap<IdempotencyKey, Hash>>,
}

impl<D, R, G> SettlementReconciler<D, R, G>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
    G: BlockchainGateway,
{
    /// Create a new reconciler.
    pub fn new(
        config: SettlementConfig,
        directory: Arc<D>,
        repository: Arc<R>,
        gateway: Arc<G>,
        events: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            directory,
            repository,
            gateway,
            events,
            time_source,
            in_flight: Mutex::new(HashSet::new()),
            completed: RwLock::new(HashMap::new()),
        }
    }

    /// Reconciler configuration.
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    fn load(&self, id: InvestmentId) -> SettlementResult<Investment> {
        self.repository
            .get(&id)?
            .ok_or(SettlementError::InvestmentNotFound(id))
    }

    fn opportunity(&self, id: &OpportunityId) -> SettlementResult<InvestmentOpportunity> {
        self.directory
            .get(id)?
            .ok_or(SettlementError::OpportunityNotFound(*id))
    }

    fn completed_tx(&self, key: &IdempotencyKey) -> Option<Hash> {
        self.completed.read().get(key).copied()
    }

    fn claim(&self, key: IdempotencyKey) -> Option<InFlightGuard<'_>> {
        if !self.in_flight.lock().insert(key) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key,
        })
    }

    /// Runs `call` with a timeout per attempt and capped exponential backoff
    /// between attempts. Stops early on a non-transient error or when the
    /// investment has left the status the call needs.
    async fn call_with_retries<T, F, Fut>(&self, call: ChainCall, mut attempt_fn: F) -> SettlementResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.backoff_for(attempt - 1)).await;
                if let Some((id, expected)) = call.guard() {
                    let status = self.load(id)?.status;
                    if status != expected {
                        debug!("[ic-04] Abandoning {}: investment is now {}", call, status);
                        return Err(SettlementError::WrongStatus { status });
                    }
                }
            }

            let result = match tokio::time::timeout(self.config.call_timeout(), attempt_fn()).await
            {
                Ok(result) => result,
                Err(_) => Err(ChainError::Timeout {
                    after_ms: self.config.call_timeout_ms,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        "[ic-04] {} failed (attempt {}/{}): {}",
                        call, attempt, self.config.max_attempts, err
                    );
                    last_error = err.to_string();
                    if let ChainCall::Mint(id) = call {
                        self.note_mint_failure(id, &last_error).await?;
                    }
                    if !err.is_transient() {
                        return Err(SettlementError::Chain(err));
                    }
                }
            }
        }
        Err(SettlementError::BlockchainUnavailable {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    async fn note_mint_failure(&self, id: InvestmentId, error: &str) -> SettlementResult<()> {
        let investment = self.load(id)?;
        let now = self.time_source.now();
        let attempt = self
            .repository
            .update_settlement(&id, &mut |settlement| {
                settlement.mint_attempts = settlement.mint_attempts.saturating_add(1);
                settlement.blockchain_error = Some(error.to_string());
                settlement.last_settlement_at = Some(now);
            })?
            .mint_attempts;

        self.events
            .publish(PlatformEvent::MintFailed {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                attempt,
                error: error.to_string(),
            })
            .await;
        Ok(())
    }

    async fn mint(&self, id: InvestmentId, enforce_ceiling: bool) -> SettlementResult<SettlementOutcome> {
        let investment = self.load(id)?;
        if investment.status != InvestmentStatus::Confirmed {
            return Ok(SettlementOutcome::Skipped(SkipReason::Status(
                investment.status,
            )));
        }

        let key = IdempotencyKey::mint(investment.id, investment.opportunity_id);
        if let Some(tx_hash) = investment
            .settlement
            .mint_tx_hash
            .or_else(|| self.completed_tx(&key))
        {
            return Ok(SettlementOutcome::AlreadySettled { tx_hash });
        }

        let Some(wallet) = investment.settlement.wallet_address else {
            debug!("[ic-04] {} has no wallet; mint skipped", id);
            return Ok(SettlementOutcome::Skipped(SkipReason::NoWallet));
        };

        if enforce_ceiling && investment.settlement.mint_attempts >= self.config.max_total_attempts
        {
            return Err(SettlementError::AttemptsExhausted {
                attempts: investment.settlement.mint_attempts,
            });
        }

        let opportunity = self.opportunity(&investment.opportunity_id)?;
        let Some(contract) = opportunity.active_contract().map(|c| c.contract_address) else {
            debug!("[ic-04] {} has no active contract; mint skipped", opportunity.id);
            return Ok(SettlementOutcome::Skipped(SkipReason::NoContract));
        };

        let Some(_guard) = self.claim(key) else {
            return Ok(SettlementOutcome::InFlight);
        };
        // A job that held the key may have finished between the checks above
        if let Some(tx_hash) = self.completed_tx(&key) {
            return Ok(SettlementOutcome::AlreadySettled { tx_hash });
        }

        let bonds = investment.bonds;
        let gateway = &self.gateway;
        let receipt = self
            .call_with_retries(ChainCall::Mint(id), || gateway.mint(key, contract, wallet, bonds))
            .await?;

        // The receipt balance is the wallet total; other investments may share the wallet
        let now = self.time_source.now();
        self.repository.update_settlement(&id, &mut |settlement| {
            settlement.mint_tx_hash = Some(receipt.tx_hash);
            settlement.on_chain_bonds = Some(bonds);
            settlement.on_chain_token_balance = Some(token_balance_for(bonds));
            settlement.blockchain_error = None;
            settlement.mint_attempts = settlement.mint_attempts.saturating_add(1);
            settlement.last_settlement_at = Some(now);
        })?;
        self.completed.write().insert(key, receipt.tx_hash);

        info!(
            "[ic-04] Minted {} bonds for {} to {}, wallet holds {} (tx {})",
            bonds,
            id,
            to_hex(&wallet),
            receipt.balance.bonds,
            to_hex(&receipt.tx_hash)
        );
        self.events
            .publish(PlatformEvent::MintRecorded {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                tx_hash: receipt.tx_hash,
                bonds,
            })
            .await;

        Ok(SettlementOutcome::Minted {
            tx_hash: receipt.tx_hash,
            on_chain_bonds: bonds,
            wallet_bonds: receipt.balance.bonds,
        })
    }
}

#[async_trait]
impl<D, R, G> SettlementApi for SettlementReconciler<D, R, G>
where
    D: OpportunityDirectory,
    R: InvestmentRepository,
    G: BlockchainGateway,
{
    async fn on_confirmed(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError> {
        self.mint(id, true).await
    }

    async fn compensate(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError> {
        let investment = self.load(id)?;
        if investment.status != InvestmentStatus::Refunded {
            return Ok(SettlementOutcome::Skipped(SkipReason::Status(
                investment.status,
            )));
        }

        let key = IdempotencyKey::transfer_back(investment.id, investment.opportunity_id);
        if let Some(tx_hash) = investment
            .settlement
            .compensation_tx_hash
            .or_else(|| self.completed_tx(&key))
        {
            return Ok(SettlementOutcome::AlreadySettled { tx_hash });
        }
        if !investment.is_minted() {
            return Ok(SettlementOutcome::Skipped(SkipReason::NothingMinted));
        }
        let Some(wallet) = investment.settlement.wallet_address else {
            return Ok(SettlementOutcome::Skipped(SkipReason::NoWallet));
        };

        // Minted bonds stay on the bound contract even after deactivation
        let opportunity = self.opportunity(&investment.opportunity_id)?;
        let Some(contract) = opportunity.contract.as_ref().map(|c| c.contract_address) else {
            return Ok(SettlementOutcome::Skipped(SkipReason::NoContract));
        };

        let Some(_guard) = self.claim(key) else {
            return Ok(SettlementOutcome::InFlight);
        };

        let treasury = self.config.treasury_address;
        let bonds = investment.bonds;
        let gateway = &self.gateway;
        let receipt = self
            .call_with_retries(ChainCall::TransferBack(id), || {
                gateway.transfer(key, contract, wallet, treasury, bonds)
            })
            .await?;

        let now = self.time_source.now();
        self.repository.update_settlement(&id, &mut |settlement| {
            settlement.compensation_tx_hash = Some(receipt.tx_hash);
            settlement.on_chain_bonds = Some(0);
            settlement.on_chain_token_balance = Some(0);
            settlement.last_settlement_at = Some(now);
        })?;
        self.completed.write().insert(key, receipt.tx_hash);

        info!(
            "[ic-04] Transferred {} bonds of {} back to treasury (tx {})",
            bonds,
            id,
            to_hex(&receipt.tx_hash)
        );
        self.events
            .publish(PlatformEvent::CompensationRecorded {
                investment_id: id,
                opportunity_id: investment.opportunity_id,
                tx_hash: receipt.tx_hash,
            })
            .await;

        Ok(SettlementOutcome::Compensated {
            tx_hash: receipt.tx_hash,
        })
    }

    async fn retry_mint(&self, id: InvestmentId) -> Result<SettlementOutcome, SettlementError> {
        let status = self.load(id)?.status;
        if status != InvestmentStatus::Confirmed {
            return Err(SettlementError::WrongStatus { status });
        }
        info!("[ic-04] Operator retry of mint for {}", id);
        self.mint(id, false).await
    }

    fn requeue_failed(&self, scheduler: &dyn SettlementScheduler) -> Result<usize, SettlementError> {
        let mut jobs = Vec::new();

        for investment in self.repository.list_by_status(InvestmentStatus::Confirmed)? {
            let settlement = &investment.settlement;
            if settlement.wallet_address.is_some()
                && !investment.is_minted()
                && settlement.blockchain_error.is_some()
                && settlement.mint_attempts < self.config.max_total_attempts
            {
                jobs.push(SettlementJob::Mint(investment.id));
            }
        }
        for investment in self.repository.list_by_status(InvestmentStatus::Refunded)? {
            if investment.is_minted() && investment.settlement.compensation_tx_hash.is_none() {
                jobs.push(SettlementJob::Compensate(investment.id));
            }
        }

        let queued = jobs.into_iter().filter(|job| scheduler.schedule(*job)).count();
        if queued > 0 {
            info!("[ic-04] Re-queued {} settlement jobs", queued);
        }
        Ok(queued)
    }

    async fn get_bond_balance(
        &self,
        opportunity_id: OpportunityId,
        holder: Address,
    ) -> Result<BondBalance, SettlementError> {
        // Deactivation stops minting, not holdings
        let opportunity = self.opportunity(&opportunity_id)?;
        let contract = opportunity
            .contract
            .as_ref()
            .map(|c| c.contract_address)
            .ok_or(SettlementError::NoContract(opportunity_id))?;

        match tokio::time::timeout(
            self.config.call_timeout(),
            self.gateway.balance_of(contract, holder),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(SettlementError::Chain(ChainError::Timeout {
                after_ms: self.config.call_timeout_ms,
            })),
        }
    }

    async fn deploy_contract(
        &self,
        opportunity_id: OpportunityId,
    ) -> Result<ContractBinding, SettlementError> {
        let opportunity = self.opportunity(&opportunity_id)?;
        if opportunity.active_contract().is_some() {
            return Err(SettlementError::AlreadyDeployed(opportunity_id));
        }

        let max_supply = opportunity
            .cap()
            .checked_div(opportunity.min_investment)
            .map(|bonds| u64::try_from(bonds).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let params = DeployParams {
            opportunity_id,
            name: opportunity.name.clone(),
            symbol: opportunity.symbol.clone(),
            max_supply,
            coupon_rate_bps: opportunity.coupon_rate_bps,
            maturity_date: opportunity.maturity_date,
        };

        let gateway = &self.gateway;
        let receipt = self
            .call_with_retries(ChainCall::Deploy(opportunity_id), || {
                gateway.deploy_contract(params.clone())
            })
            .await?;

        let binding = ContractBinding {
            contract_address: receipt.contract_address,
            deploy_tx_hash: receipt.tx_hash,
            deployed_at: self.time_source.now(),
            is_active: true,
        };
        self.directory.bind_contract(&opportunity_id, binding.clone())?;

        info!(
            "[ic-04] Deployed {} contract {} for {}",
            opportunity.symbol,
            to_hex(&receipt.contract_address),
            opportunity_id
        );
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChain;
    use crate::domain::TOKEN_UNIT;
    use shared_bus::{EventFilter, InMemoryEventBus, Subscription};
    use shared_types::{
        InMemoryInvestmentRepository, InMemoryOpportunityDirectory, InvestorId, MockTimeSource,
        OpportunityStatus, PaymentMethod, RecordingScheduler, SettlementRecord,
    };

    const WALLET: Address = [7; 20];

    type Reconciler =
        SettlementReconciler<InMemoryOpportunityDirectory, InMemoryInvestmentRepository, InMemoryChain>;

    struct Fixture {
        directory: Arc<InMemoryOpportunityDirectory>,
        repository: Arc<InMemoryInvestmentRepository>,
        chain: Arc<InMemoryChain>,
        bus: Arc<InMemoryEventBus>,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryOpportunityDirectory::new());
        let repository = Arc::new(InMemoryInvestmentRepository::new());
        let chain = Arc::new(InMemoryChain::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let reconciler = SettlementReconciler::new(
            SettlementConfig::for_testing(),
            directory.clone(),
            repository.clone(),
            chain.clone(),
            bus.clone(),
            Arc::new(MockTimeSource::new(5_000)),
        );
        Fixture {
            directory,
            repository,
            chain,
            bus,
            reconciler,
        }
    }

    fn opportunity(fx: &Fixture) -> OpportunityId {
        let opp = InvestmentOpportunity::new("Harbour Bond", "HRB", 10_000, 100)
            .with_status(OpportunityStatus::Active);
        let id = opp.id;
        fx.directory.insert(opp).unwrap();
        id
    }

    async fn deployed(fx: &Fixture) -> (OpportunityId, Address) {
        let id = opportunity(fx);
        let binding = fx.reconciler.deploy_contract(id).await.unwrap();
        (id, binding.contract_address)
    }

    fn investment(
        fx: &Fixture,
        opp: OpportunityId,
        status: InvestmentStatus,
        wallet: Option<Address>,
    ) -> InvestmentId {
        let investment = Investment {
            id: InvestmentId::new(),
            opportunity_id: opp,
            investor_id: InvestorId("alice".into()),
            payment_method: PaymentMethod("card".into()),
            bonds: 5,
            amount: 500,
            status,
            created_at: 1_000,
            confirmed_at: Some(2_000),
            updated_at: 2_000,
            failure_reason: None,
            settlement: SettlementRecord {
                wallet_address: wallet,
                ..SettlementRecord::default()
            },
        };
        let id = investment.id;
        fx.repository.insert(investment).unwrap();
        id
    }

    fn settlement(fx: &Fixture, id: InvestmentId) -> SettlementRecord {
        fx.repository.get(&id).unwrap().unwrap().settlement
    }

    fn refund(fx: &Fixture, id: InvestmentId) {
        let mut stored = fx.repository.get(&id).unwrap().unwrap();
        stored.status = InvestmentStatus::Refunded;
        assert!(fx
            .repository
            .compare_and_set(InvestmentStatus::Confirmed, stored)
            .unwrap());
    }

    fn drain(sub: &mut Subscription) -> Vec<PlatformEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = sub.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_mint_records_settlement() {
        let fx = fixture();
        let mut sub = fx.bus.subscribe(EventFilter::all());
        let (opp, contract) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        let outcome = fx.reconciler.on_confirmed(id).await.unwrap();

        let record = settlement(&fx, id);
        assert_eq!(
            outcome,
            SettlementOutcome::Minted {
                tx_hash: record.mint_tx_hash.unwrap(),
                on_chain_bonds: 5,
                wallet_bonds: 5
            }
        );
        assert_eq!(record.on_chain_bonds, Some(5));
        assert_eq!(record.on_chain_token_balance, Some(5 * TOKEN_UNIT));
        assert_eq!(record.blockchain_error, None);
        assert_eq!(record.mint_attempts, 1);
        assert_eq!(fx.chain.balance(&contract, &WALLET), 5);
        assert!(drain(&mut sub)
            .iter()
            .any(|e| matches!(e, PlatformEvent::MintRecorded { bonds: 5, .. })));
    }

    #[tokio::test]
    async fn test_shared_wallet_keeps_per_investment_position() {
        let fx = fixture();
        let (opp, contract) = deployed(&fx).await;
        let first = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        let second = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        fx.reconciler.on_confirmed(first).await.unwrap();
        let outcome = fx.reconciler.on_confirmed(second).await.unwrap();

        assert!(matches!(
            outcome,
            SettlementOutcome::Minted {
                on_chain_bonds: 5,
                wallet_bonds: 10,
                ..
            }
        ));
        assert_eq!(fx.chain.balance(&contract, &WALLET), 10);
        for id in [first, second] {
            let record = settlement(&fx, id);
            assert_eq!(record.on_chain_bonds, Some(5));
            assert_eq!(record.on_chain_token_balance, Some(5 * TOKEN_UNIT));
        }
    }

    #[tokio::test]
    async fn test_repeated_delivery_mints_once() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        let first = fx.reconciler.on_confirmed(id).await.unwrap();
        let second = fx.reconciler.on_confirmed(id).await.unwrap();

        let SettlementOutcome::Minted { tx_hash, .. } = first else {
            panic!("expected mint, got {:?}", first);
        };
        assert_eq!(second, SettlementOutcome::AlreadySettled { tx_hash });
        assert_eq!(fx.chain.mint_count(), 1);
    }

    #[tokio::test]
    async fn test_lost_response_does_not_double_mint() {
        let fx = fixture();
        let (opp, contract) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        fx.chain.lose_next_responses(1);
        let outcome = fx.reconciler.on_confirmed(id).await.unwrap();

        assert!(matches!(outcome, SettlementOutcome::Minted { on_chain_bonds: 5, .. }));
        assert_eq!(fx.chain.mint_count(), 1);
        assert_eq!(fx.chain.balance(&contract, &WALLET), 5);
        assert_eq!(settlement(&fx, id).mint_attempts, 2);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_share_one_mint() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        fx.chain.set_latency(10);

        let (a, b) = tokio::join!(fx.reconciler.on_confirmed(id), fx.reconciler.on_confirmed(id));

        assert!(matches!(a.unwrap(), SettlementOutcome::Minted { .. }));
        assert_eq!(b.unwrap(), SettlementOutcome::InFlight);
        assert_eq!(fx.chain.mint_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_chain_keeps_confirmation() {
        let fx = fixture();
        let mut sub = fx.bus.subscribe(EventFilter::all());
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        fx.chain.set_unavailable(true);
        let err = fx.reconciler.on_confirmed(id).await.unwrap_err();
        assert_eq!(
            err,
            SettlementError::BlockchainUnavailable {
                attempts: 3,
                last_error: "Chain unavailable: node offline".into()
            }
        );

        let stored = fx.repository.get(&id).unwrap().unwrap();
        assert_eq!(stored.status, InvestmentStatus::Confirmed);
        assert_eq!(
            stored.settlement.blockchain_error.as_deref(),
            Some("Chain unavailable: node offline")
        );
        assert_eq!(stored.settlement.mint_attempts, 3);
        let failures = drain(&mut sub)
            .into_iter()
            .filter(|e| matches!(e, PlatformEvent::MintFailed { .. }))
            .count();
        assert_eq!(failures, 3);

        fx.chain.set_unavailable(false);
        let retried = fx.reconciler.retry_mint(id).await.unwrap();
        assert!(matches!(retried, SettlementOutcome::Minted { .. }));
        assert_eq!(settlement(&fx, id).blockchain_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        fx.chain.set_latency(500);
        let err = fx.reconciler.on_confirmed(id).await.unwrap_err();

        assert!(matches!(err, SettlementError::BlockchainUnavailable { attempts: 3, .. }));
        assert_eq!(
            settlement(&fx, id).blockchain_error.as_deref(),
            Some("Chain call timed out after 200ms")
        );
        assert_eq!(
            fx.repository.get(&id).unwrap().unwrap().status,
            InvestmentStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_attempt_ceiling_only_binds_automatic_jobs() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        let mut record = settlement(&fx, id);
        record.mint_attempts = 6;
        record.blockchain_error = Some("Chain unavailable: node offline".into());
        fx.repository.record_settlement(&id, record).unwrap();

        assert_eq!(
            fx.reconciler.on_confirmed(id).await.unwrap_err(),
            SettlementError::AttemptsExhausted { attempts: 6 }
        );
        assert!(matches!(
            fx.reconciler.retry_mint(id).await.unwrap(),
            SettlementOutcome::Minted { .. }
        ));
    }

    #[tokio::test]
    async fn test_skip_paths() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let pending = investment(&fx, opp, InvestmentStatus::Pending, Some(WALLET));
        let walletless = investment(&fx, opp, InvestmentStatus::Confirmed, None);
        let undeployed = opportunity(&fx);
        let no_contract = investment(&fx, undeployed, InvestmentStatus::Confirmed, Some(WALLET));

        assert_eq!(
            fx.reconciler.on_confirmed(pending).await.unwrap(),
            SettlementOutcome::Skipped(SkipReason::Status(InvestmentStatus::Pending))
        );
        assert_eq!(
            fx.reconciler.on_confirmed(walletless).await.unwrap(),
            SettlementOutcome::Skipped(SkipReason::NoWallet)
        );
        assert_eq!(
            fx.reconciler.on_confirmed(no_contract).await.unwrap(),
            SettlementOutcome::Skipped(SkipReason::NoContract)
        );
        assert_eq!(fx.chain.mint_count(), 0);
        assert_eq!(
            fx.reconciler.retry_mint(pending).await.unwrap_err(),
            SettlementError::WrongStatus {
                status: InvestmentStatus::Pending
            }
        );
    }

    #[tokio::test]
    async fn test_compensation_returns_bonds_to_treasury() {
        let fx = fixture();
        let (opp, contract) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        fx.reconciler.on_confirmed(id).await.unwrap();
        refund(&fx, id);

        let outcome = fx.reconciler.compensate(id).await.unwrap();
        let SettlementOutcome::Compensated { tx_hash } = outcome else {
            panic!("expected compensation, got {:?}", outcome);
        };

        let treasury = SettlementConfig::for_testing().treasury_address;
        assert_eq!(fx.chain.balance(&contract, &WALLET), 0);
        assert_eq!(fx.chain.balance(&contract, &treasury), 5);
        let record = settlement(&fx, id);
        assert_eq!(record.compensation_tx_hash, Some(tx_hash));
        assert_eq!(record.on_chain_bonds, Some(0));
        assert!(record.mint_tx_hash.is_some());
        assert_eq!(
            fx.reconciler.compensate(id).await.unwrap(),
            SettlementOutcome::AlreadySettled { tx_hash }
        );
    }

    #[tokio::test]
    async fn test_compensation_skips_unminted() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;
        let id = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        refund(&fx, id);

        assert_eq!(
            fx.reconciler.compensate(id).await.unwrap(),
            SettlementOutcome::Skipped(SkipReason::NothingMinted)
        );
    }

    #[tokio::test]
    async fn test_requeue_failed_selects_retryable_work() {
        let fx = fixture();
        let (opp, _) = deployed(&fx).await;

        let failed = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        let mut record = settlement(&fx, failed);
        record.blockchain_error = Some("Chain unavailable: node offline".into());
        record.mint_attempts = 3;
        fx.repository.record_settlement(&failed, record.clone()).unwrap();

        let exhausted = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        record.mint_attempts = 6;
        fx.repository.record_settlement(&exhausted, record).unwrap();

        let refunded = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        fx.reconciler.on_confirmed(refunded).await.unwrap();
        refund(&fx, refunded);

        // Healthy confirmed investment without error
        investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));

        let scheduler = RecordingScheduler::new();
        assert_eq!(fx.reconciler.requeue_failed(&scheduler).unwrap(), 2);
        let jobs = scheduler.jobs();
        assert!(jobs.contains(&SettlementJob::Mint(failed)));
        assert!(jobs.contains(&SettlementJob::Compensate(refunded)));
    }

    #[tokio::test]
    async fn test_deploy_binds_once() {
        let fx = fixture();
        let (opp, contract) = deployed(&fx).await;

        let bound = fx.directory.get(&opp).unwrap().unwrap();
        assert_eq!(bound.active_contract().unwrap().contract_address, contract);
        assert_eq!(
            fx.reconciler.deploy_contract(opp).await.unwrap_err(),
            SettlementError::AlreadyDeployed(opp)
        );
    }

    #[tokio::test]
    async fn test_bond_balance_reads_chain() {
        let fx = fixture();
        let (opp, contract) = deployed(&fx).await;
        fx.chain.force_balance(&contract, WALLET, 3);

        let balance = fx.reconciler.get_bond_balance(opp, WALLET).await.unwrap();
        assert_eq!(balance.bonds, 3);
        assert_eq!(balance.token_balance, 3 * TOKEN_UNIT);

        // Holdings stay readable after the contract is deactivated
        let mut binding = fx.directory.get(&opp).unwrap().unwrap().contract.unwrap();
        binding.is_active = false;
        fx.directory.bind_contract(&opp, binding).unwrap();
        assert_eq!(
            fx.reconciler.get_bond_balance(opp, WALLET).await.unwrap().bonds,
            3
        );
        let pending = investment(&fx, opp, InvestmentStatus::Confirmed, Some(WALLET));
        assert_eq!(
            fx.reconciler.on_confirmed(pending).await.unwrap(),
            SettlementOutcome::Skipped(SkipReason::NoContract)
        );

        let undeployed = opportunity(&fx);
        assert_eq!(
            fx.reconciler
                .get_bond_balance(undeployed, WALLET)
                .await
                .unwrap_err(),
            SettlementError::NoContract(undeployed)
        );
    }
}
