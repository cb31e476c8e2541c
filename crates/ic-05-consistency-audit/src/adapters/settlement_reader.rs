//! Balance reads through the settlement reconciler.

use crate::ports::BalanceReader;
use async_trait::async_trait;
use ic_04_settlement::SettlementApi;
use shared_types::{Address, OpportunityId};
use std::sync::Arc;

/// `BalanceReader` backed by `SettlementApi::get_bond_balance`.
pub struct SettlementBalanceReader<S: SettlementApi + ?Sized> {
    settlement: Arc<S>,
}

impl<S: SettlementApi + ?Sized> SettlementBalanceReader<S> {
    /// Wrap a settlement reconciler.
    pub fn new(settlement: Arc<S>) -> Self {
        Self { settlement }
    }
}

#[async_trait]
impl<S: SettlementApi + ?Sized> BalanceReader for SettlementBalanceReader<S> {
    async fn bond_balance(
        &self,
        opportunity_id: OpportunityId,
        holder: Address,
    ) -> Result<u64, String> {
        self.settlement
            .get_bond_balance(opportunity_id, holder)
            .await
            .map(|balance| balance.bonds)
            .map_err(|e| e.to_string())
    }
}
