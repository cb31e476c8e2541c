//! # In-Memory Chain
//!
//! Simulated bond-token chain implementing `BlockchainGateway`. Receipts are
//! remembered per idempotency key and deployments per opportunity, so a
//! repeated call returns the original receipt without executing again.
//!
//! Fault injection covers the failure modes the reconciler has to survive:
//!
//! | Fault | Effect |
//! |-------|--------|
//! | `fail_next(n)` | next `n` state-changing calls fail before executing |
//! | `set_unavailable(true)` | every call fails until cleared |
//! | `lose_next_responses(n)` | next `n` calls execute, then report failure |
//! | `set_latency(ms)` | every call sleeps first (drives timeouts) |

use crate::domain::{BondBalance, ChainError, DeployParams, DeployReceipt, TxReceipt};
use crate::ports::BlockchainGateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use shared_types::{to_hex, Address, Hash, IdempotencyKey, OpportunityId};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct BondContract {
    max_supply: u64,
    minted: u64,
    balances: HashMap<Address, u64>,
}

#[derive(Debug, Default)]
struct ChainState {
    contracts: HashMap<Address, BondContract>,
    deployments: HashMap<OpportunityId, DeployReceipt>,
    receipts: HashMap<IdempotencyKey, TxReceipt>,
    nonce: u64,
    mints_executed: u64,
}

impl ChainState {
    fn next_tx_hash(&mut self, tag: &str) -> Hash {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"ic-chain-tx");
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(tag.as_bytes());
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        hash
    }

    fn contract_mut(&mut self, address: &Address) -> Result<&mut BondContract, ChainError> {
        self.contracts
            .get_mut(address)
            .ok_or_else(|| ChainError::ContractNotFound(to_hex(address)))
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: u32,
    unavailable: bool,
    lose_next: u32,
    latency_ms: u64,
}

/// Simulated chain gateway.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
    faults: Mutex<Faults>,
}

impl InMemoryChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` state-changing calls before they execute.
    pub fn fail_next(&self, n: u32) {
        self.faults.lock().fail_next = n;
    }

    /// Take the node offline (or back online).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    /// Execute the next `n` state-changing calls but report failure.
    pub fn lose_next_responses(&self, n: u32) {
        self.faults.lock().lose_next = n;
    }

    /// Delay every call by `ms`.
    pub fn set_latency(&self, ms: u64) {
        self.faults.lock().latency_ms = ms;
    }

    /// Mints that actually executed (deduplicated calls excluded).
    pub fn mint_count(&self) -> u64 {
        self.state.lock().mints_executed
    }

    /// Bonds held, or 0 for unknown contracts.
    pub fn balance(&self, contract: &Address, holder: &Address) -> u64 {
        self.state
            .lock()
            .contracts
            .get(contract)
            .and_then(|c| c.balances.get(holder).copied())
            .unwrap_or(0)
    }

    /// Overwrite a balance out of band, as an external transfer would.
    pub fn force_balance(&self, contract: &Address, holder: Address, bonds: u64) {
        let mut state = self.state.lock();
        let contract = state.contracts.entry(*contract).or_default();
        contract.balances.insert(holder, bonds);
    }

    async fn enter(&self) -> Result<(), ChainError> {
        let latency = self.faults.lock().latency_ms;
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let mut faults = self.faults.lock();
        if faults.unavailable {
            return Err(ChainError::Unavailable("node offline".into()));
        }
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(ChainError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn leave<T>(&self, value: T) -> Result<T, ChainError> {
        let mut faults = self.faults.lock();
        if faults.lose_next > 0 {
            faults.lose_next -= 1;
            return Err(ChainError::Unavailable("response lost".into()));
        }
        Ok(value)
    }
}

#[async_trait]
impl BlockchainGateway for InMemoryChain {
    async fn deploy_contract(&self, params: DeployParams) -> Result<DeployReceipt, ChainError> {
        self.enter().await?;
        let receipt = {
            let mut state = self.state.lock();
            match state.deployments.get(&params.opportunity_id).copied() {
                Some(existing) => existing,
                None => {
                    let tx_hash = state.next_tx_hash(&params.symbol);
                    let mut contract_address = [0u8; 20];
                    contract_address.copy_from_slice(&tx_hash[12..]);
                    state.contracts.insert(
                        contract_address,
                        BondContract {
                            max_supply: params.max_supply,
                            ..BondContract::default()
                        },
                    );
                    let receipt = DeployReceipt {
                        contract_address,
                        tx_hash,
                    };
                    state.deployments.insert(params.opportunity_id, receipt);
                    debug!(
                        contract = %to_hex(&contract_address),
                        symbol = %params.symbol,
                        "Bond contract deployed"
                    );
                    receipt
                }
            }
        };
        self.leave(receipt)
    }

    async fn mint(
        &self,
        key: IdempotencyKey,
        contract: Address,
        to: Address,
        bonds: u64,
    ) -> Result<TxReceipt, ChainError> {
        self.enter().await?;
        let receipt = {
            let mut state = self.state.lock();
            if let Some(existing) = state.receipts.get(&key).copied() {
                existing
            } else {
                let held = {
                    let bond = state.contract_mut(&contract)?;
                    let minted = bond.minted.saturating_add(bonds);
                    if minted > bond.max_supply {
                        return Err(ChainError::Rejected(format!(
                            "max supply {} exceeded",
                            bond.max_supply
                        )));
                    }
                    bond.minted = minted;
                    let held = bond.balances.entry(to).or_insert(0);
                    *held += bonds;
                    *held
                };
                let receipt = TxReceipt {
                    tx_hash: state.next_tx_hash(&key.to_string()),
                    balance: BondBalance::new(contract, to, held),
                };
                state.mints_executed += 1;
                state.receipts.insert(key, receipt);
                receipt
            }
        };
        self.leave(receipt)
    }

    async fn balance_of(
        &self,
        contract: Address,
        holder: Address,
    ) -> Result<BondBalance, ChainError> {
        self.enter().await?;
        let mut state = self.state.lock();
        let bonds = state
            .contract_mut(&contract)?
            .balances
            .get(&holder)
            .copied()
            .unwrap_or(0);
        Ok(BondBalance::new(contract, holder, bonds))
    }

    async fn transfer(
        &self,
        key: IdempotencyKey,
        contract: Address,
        from: Address,
        to: Address,
        bonds: u64,
    ) -> Result<TxReceipt, ChainError> {
        self.enter().await?;
        let receipt = {
            let mut state = self.state.lock();
            if let Some(existing) = state.receipts.get(&key).copied() {
                existing
            } else {
                let remaining = {
                    let bond = state.contract_mut(&contract)?;
                    let held = bond.balances.get(&from).copied().unwrap_or(0);
                    if held < bonds {
                        return Err(ChainError::InsufficientBonds {
                            held,
                            requested: bonds,
                        });
                    }
                    bond.balances.insert(from, held - bonds);
                    *bond.balances.entry(to).or_insert(0) += bonds;
                    held - bonds
                };
                let receipt = TxReceipt {
                    tx_hash: state.next_tx_hash(&key.to_string()),
                    balance: BondBalance::new(contract, from, remaining),
                };
                state.receipts.insert(key, receipt);
                receipt
            }
        };
        self.leave(receipt)
    }
}
