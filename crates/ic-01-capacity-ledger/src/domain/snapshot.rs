//! # Capacity Snapshot and Ledger Configuration

use serde::{Deserialize, Serialize};
use shared_types::{Amount, InvestmentOpportunity, OpportunityId, OpportunityStatus, Timestamp};

/// Point-in-time view of an opportunity's capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    /// Opportunity the figures belong to.
    pub opportunity_id: OpportunityId,
    /// Effective cap.
    pub cap: Amount,
    /// Confirmed funding.
    pub current_funding: Amount,
    /// `cap - current_funding`, saturating.
    pub remaining: Amount,
    /// Status read together with the funding figure.
    pub status: OpportunityStatus,
    /// Closing time read together with the funding figure.
    pub closes_at: Option<Timestamp>,
}

impl CapacitySnapshot {
    /// Snapshot of an opportunity as stored.
    pub fn of(opportunity: &InvestmentOpportunity) -> Self {
        Self {
            opportunity_id: opportunity.id,
            cap: opportunity.cap(),
            current_funding: opportunity.current_funding,
            remaining: opportunity.remaining(),
            status: opportunity.status,
            closes_at: opportunity.closes_at,
        }
    }

    /// Same snapshot with a different funding figure.
    pub(crate) fn with_funding(&self, current_funding: Amount) -> Self {
        Self {
            current_funding,
            remaining: self.cap.saturating_sub(current_funding),
            ..*self
        }
    }

    /// Returns true if the opportunity was open for confirmations when
    /// these figures were read.
    pub fn accepts_investments(&self, now: Timestamp) -> bool {
        self.status == OpportunityStatus::Active
            && self.closes_at.map_or(true, |closes_at| now < closes_at)
    }

    /// True once nothing is left to reserve.
    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

/// Capacity ledger configuration.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Compare-and-swap attempts before reporting contention.
    pub max_cas_retries: u32,
    /// Close the opportunity when a reservation fills the cap.
    pub auto_close_on_target: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: 8,
            auto_close_on_target: false,
        }
    }
}

impl LedgerConfig {
    /// Configuration for tests: small retry budget.
    pub fn for_testing() -> Self {
        Self {
            max_cas_retries: 3,
            ..Self::default()
        }
    }
}
