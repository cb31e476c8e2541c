//! # Inbound Ports
//!
//! API trait defining what the Capacity Ledger can do.

use crate::domain::{CapacitySnapshot, LedgerError};
use shared_types::{Amount, OpportunityId};

/// Capacity ledger API - inbound port.
pub trait CapacityApi: Send + Sync {
    /// Atomically adds `amount` to the opportunity's funding if it fits.
    fn reserve(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> Result<CapacitySnapshot, LedgerError>;

    /// Atomically subtracts `amount`. Never drops below zero.
    fn release(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> Result<CapacitySnapshot, LedgerError>;

    /// Current capacity figures.
    fn snapshot(&self, opportunity_id: &OpportunityId) -> Result<CapacitySnapshot, LedgerError>;
}
