//! # Domain Errors
//!
//! Lifecycle errors. Admission and ledger errors are folded into the
//! operator-facing taxonomy here so callers match on one enum.

use ic_01_capacity_ledger::LedgerError;
use ic_02_admission::AdmissionError;
use shared_types::{
    Amount, InvestmentId, InvestmentStatus, OpportunityId, OpportunityStatus, StoreError,
    Timestamp,
};
use thiserror::Error;

/// Lifecycle error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The opportunity is not accepting investments.
    #[error("Opportunity is {status}, not active")]
    OpportunityNotActive {
        /// Status found at check time.
        status: OpportunityStatus,
    },

    /// The offering window has closed.
    #[error("Opportunity closed for subscriptions at {closes_at}")]
    OpportunityExpired {
        /// Closing instant (ms).
        closes_at: Timestamp,
    },

    /// Confirming would exceed the cap.
    #[error("Funding exceeded: {remaining} remaining, {attempted} attempted")]
    FundingExceeded {
        /// Capacity left at reservation time.
        remaining: Amount,
        /// Investment amount.
        attempted: Amount,
    },

    /// The price moved since submission.
    #[error("Amount drift: snapshot {snapshot}, now {recomputed}, tolerance {tolerance}")]
    AmountDrift {
        /// Submitted amount.
        snapshot: Amount,
        /// Amount at today's price.
        recomputed: Amount,
        /// Allowed difference.
        tolerance: Amount,
    },

    /// Edge not in the transition table.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: InvestmentStatus,
        /// Requested status.
        to: InvestmentStatus,
    },

    /// Unknown investment.
    #[error("Investment not found: {0}")]
    InvestmentNotFound(InvestmentId),

    /// Unknown opportunity.
    #[error("Opportunity not found: {0}")]
    OpportunityNotFound(OpportunityId),

    /// Submission rejected by admission.
    #[error("Admission rejected: {0}")]
    Rejected(AdmissionError),

    /// Capacity ledger failure other than a cap breach.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCapacity {
                remaining,
                attempted,
            } => Self::FundingExceeded {
                remaining,
                attempted,
            },
            LedgerError::OpportunityNotFound(id) => Self::OpportunityNotFound(id),
            LedgerError::Store(e) => Self::Store(e),
            other => Self::Ledger(other),
        }
    }
}

impl From<AdmissionError> for LifecycleError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::OpportunityNotActive { status } => {
                Self::OpportunityNotActive { status }
            }
            AdmissionError::OpportunityExpired { closes_at } => {
                Self::OpportunityExpired { closes_at }
            }
            AdmissionError::AmountDrift {
                snapshot,
                recomputed,
                tolerance,
            } => Self::AmountDrift {
                snapshot,
                recomputed,
                tolerance,
            },
            AdmissionError::OpportunityNotFound(id) => Self::OpportunityNotFound(id),
            AdmissionError::Store(e) => Self::Store(e),
            other => Self::Rejected(other),
        }
    }
}
