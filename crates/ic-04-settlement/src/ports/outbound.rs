//! # Outbound Ports
//!
//! Boundary to the external chain. Every state-changing call carries an
//! idempotency key; a gateway that sees a key twice returns the original
//! receipt instead of executing again.

use crate::domain::{BondBalance, ChainError, DeployParams, DeployReceipt, TxReceipt};
use async_trait::async_trait;
use shared_types::{Address, IdempotencyKey};

/// Blockchain gateway - outbound port.
#[async_trait]
pub trait BlockchainGateway: Send + Sync {
    /// Deploy a bond contract. Deduplicated on `params.opportunity_id`.
    async fn deploy_contract(&self, params: DeployParams) -> Result<DeployReceipt, ChainError>;

    /// Mint `bonds` to `to`.
    async fn mint(
        &self,
        key: IdempotencyKey,
        contract: Address,
        to: Address,
        bonds: u64,
    ) -> Result<TxReceipt, ChainError>;

    /// Bonds held by `holder`. Read-only.
    async fn balance_of(&self, contract: Address, holder: Address)
        -> Result<BondBalance, ChainError>;

    /// Move `bonds` from `from` to `to`.
    async fn transfer(
        &self,
        key: IdempotencyKey,
        contract: Address,
        from: Address,
        to: Address,
        bonds: u64,
    ) -> Result<TxReceipt, ChainError>;
}
