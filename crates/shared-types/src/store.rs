//! # Store Ports
//!
//! Boundary to the record stores owned by the surrounding platform:
//! the opportunity directory (admin CRUD collaborator) and the investment
//! repository. In-memory adapters are provided for the runtime and tests.
//!
//! ## Write discipline
//!
//! | Field | Writer |
//! |-------|--------|
//! | `InvestmentOpportunity::current_funding` | Capacity ledger only (`compare_and_set_funding`) |
//! | `Investment::status` | Lifecycle only (`compare_and_set`) |
//! | `Investment::settlement` | Settlement reconciler only (`update_settlement`) |

use crate::entities::{
    Amount, ContractBinding, Investment, InvestmentId, InvestmentOpportunity, InvestmentStatus,
    OpportunityId, OpportunityStatus, SettlementRecord,
};
use crate::errors::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read/write access to opportunities.
pub trait OpportunityDirectory: Send + Sync {
    /// Gets an opportunity by id.
    fn get(&self, id: &OpportunityId) -> Result<Option<InvestmentOpportunity>, StoreError>;

    /// Lists all opportunities.
    fn list(&self) -> Result<Vec<InvestmentOpportunity>, StoreError>;

    /// Registers a new opportunity (operator action).
    fn insert(&self, opportunity: InvestmentOpportunity) -> Result<(), StoreError>;

    /// Changes the lifecycle status (operator action or automatic close).
    fn set_status(&self, id: &OpportunityId, status: OpportunityStatus) -> Result<(), StoreError>;

    /// Reprices one bond (operator action). Pending investments keep their
    /// snapshotted amount; confirmation detects the drift.
    fn set_min_investment(&self, id: &OpportunityId, price: Amount) -> Result<(), StoreError>;

    /// Binds a deployed contract.
    fn bind_contract(&self, id: &OpportunityId, binding: ContractBinding)
        -> Result<(), StoreError>;

    /// Sets `current_funding` to `new` only if it still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first. Reserved for
    /// the capacity ledger.
    fn compare_and_set_funding(
        &self,
        id: &OpportunityId,
        expected: Amount,
        new: Amount,
    ) -> Result<bool, StoreError>;
}

/// Read/write access to investments.
pub trait InvestmentRepository: Send + Sync {
    /// Stores a newly admitted investment.
    fn insert(&self, investment: Investment) -> Result<(), StoreError>;

    /// Gets an investment by id.
    fn get(&self, id: &InvestmentId) -> Result<Option<Investment>, StoreError>;

    /// Replaces the stored investment only if its status still equals `expected`.
    ///
    /// Returns `Ok(false)` when the stored status moved on.
    fn compare_and_set(
        &self,
        expected: InvestmentStatus,
        investment: Investment,
    ) -> Result<bool, StoreError>;

    /// Overwrites the settlement mirror without touching status or amount.
    fn record_settlement(
        &self,
        id: &InvestmentId,
        settlement: SettlementRecord,
    ) -> Result<(), StoreError>;

    /// Applies `update` to the stored settlement mirror in one atomic step
    /// and returns the result. Concurrent settlement writers never lose
    /// each other's fields.
    fn update_settlement(
        &self,
        id: &InvestmentId,
        update: &mut dyn FnMut(&mut SettlementRecord),
    ) -> Result<SettlementRecord, StoreError>;

    /// Lists investments for one opportunity.
    fn list_by_opportunity(&self, id: &OpportunityId) -> Result<Vec<Investment>, StoreError>;

    /// Lists investments in a given status.
    fn list_by_status(&self, status: InvestmentStatus) -> Result<Vec<Investment>, StoreError>;
}

// =============================================================================
// In-memory adapters
// =============================================================================

/// In-memory opportunity directory.
#[derive(Debug, Default)]
pub struct InMemoryOpportunityDirectory {
    records: RwLock<HashMap<OpportunityId, InvestmentOpportunity>>,
}

impl InMemoryOpportunityDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        id: &OpportunityId,
        f: impl FnOnce(&mut InvestmentOpportunity) -> T,
    ) -> Result<T, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(f(record))
    }
}

impl OpportunityDirectory for InMemoryOpportunityDirectory {
    fn get(&self, id: &OpportunityId) -> Result<Option<InvestmentOpportunity>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<InvestmentOpportunity>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn insert(&self, opportunity: InvestmentOpportunity) -> Result<(), StoreError> {
        if let Some(reason) = opportunity.invariant_violation() {
            return Err(StoreError::Invalid {
                id: opportunity.id.to_string(),
                reason,
            });
        }
        let mut records = self.records.write();
        if records.contains_key(&opportunity.id) {
            return Err(StoreError::AlreadyExists(opportunity.id.to_string()));
        }
        records.insert(opportunity.id, opportunity);
        Ok(())
    }

    fn set_status(&self, id: &OpportunityId, status: OpportunityStatus) -> Result<(), StoreError> {
        self.with_record(id, |record| record.status = status)
    }

    fn set_min_investment(&self, id: &OpportunityId, price: Amount) -> Result<(), StoreError> {
        if price == 0 {
            return Err(StoreError::Invalid {
                id: id.to_string(),
                reason: "minimum investment must be positive",
            });
        }
        self.with_record(id, |record| record.min_investment = price)
    }

    fn bind_contract(
        &self,
        id: &OpportunityId,
        binding: ContractBinding,
    ) -> Result<(), StoreError> {
        self.with_record(id, |record| record.contract = Some(binding))
    }

    fn compare_and_set_funding(
        &self,
        id: &OpportunityId,
        expected: Amount,
        new: Amount,
    ) -> Result<bool, StoreError> {
        self.with_record(id, |record| {
            if record.current_funding != expected {
                return false;
            }
            record.current_funding = new;
            true
        })
    }
}

/// In-memory investment repository.
#[derive(Debug, Default)]
pub struct InMemoryInvestmentRepository {
    records: RwLock<HashMap<InvestmentId, Investment>>,
}

impl InMemoryInvestmentRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored investments.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl InvestmentRepository for InMemoryInvestmentRepository {
    fn insert(&self, investment: Investment) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&investment.id) {
            return Err(StoreError::AlreadyExists(investment.id.to_string()));
        }
        records.insert(investment.id, investment);
        Ok(())
    }

    fn get(&self, id: &InvestmentId) -> Result<Option<Investment>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn compare_and_set(
        &self,
        expected: InvestmentStatus,
        investment: Investment,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        let stored = records
            .get_mut(&investment.id)
            .ok_or_else(|| StoreError::NotFound(investment.id.to_string()))?;
        if stored.status != expected {
            return Ok(false);
        }
        // Settlement is owned by the reconciler; keep the stored mirror
        let settlement = std::mem::take(&mut stored.settlement);
        *stored = Investment {
            settlement,
            ..investment
        };
        Ok(true)
    }

    fn record_settlement(
        &self,
        id: &InvestmentId,
        settlement: SettlementRecord,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let stored = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        stored.settlement = settlement;
        Ok(())
    }

    fn update_settlement(
        &self,
        id: &InvestmentId,
        update: &mut dyn FnMut(&mut SettlementRecord),
    ) -> Result<SettlementRecord, StoreError> {
        let mut records = self.records.write();
        let stored = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update(&mut stored.settlement);
        Ok(stored.settlement.clone())
    }

    fn list_by_opportunity(&self, id: &OpportunityId) -> Result<Vec<Investment>, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|inv| inv.opportunity_id == *id)
            .cloned()
            .collect())
    }

    fn list_by_status(&self, status: InvestmentStatus) -> Result<Vec<Investment>, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|inv| inv.status == status)
            .cloned()
            .collect())
    }
}
