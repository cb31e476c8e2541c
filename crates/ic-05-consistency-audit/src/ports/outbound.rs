//! # Outbound Ports

use async_trait::async_trait;
use shared_types::{Address, OpportunityId};

/// Fresh on-chain balance reads.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Bonds `holder` holds on the opportunity's contract.
    ///
    /// The error is carried into the audit record verbatim.
    async fn bond_balance(
        &self,
        opportunity_id: OpportunityId,
        holder: Address,
    ) -> Result<u64, String>;
}
