//! # Domain Errors
//!
//! Error types for the Capacity Ledger.

use shared_types::{Amount, OpportunityId, StoreError};
use thiserror::Error;

/// Capacity ledger error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The reservation would push funding past the cap.
    #[error("Insufficient capacity: {remaining} remaining, {attempted} attempted")]
    InsufficientCapacity {
        /// Capacity left before the attempt.
        remaining: Amount,
        /// Amount the caller tried to reserve.
        attempted: Amount,
    },

    /// Unknown opportunity.
    #[error("Opportunity not found: {0}")]
    OpportunityNotFound(OpportunityId),

    /// A release larger than the confirmed funding.
    #[error("Release underflow: funding {current_funding}, release {attempted}")]
    ReleaseUnderflow {
        /// Funding currently recorded.
        current_funding: Amount,
        /// Amount the caller tried to release.
        attempted: Amount,
    },

    /// Compare-and-swap retries exhausted.
    #[error("Funding counter contended for {opportunity_id} after {attempts} attempts")]
    Contention {
        /// Contended opportunity.
        opportunity_id: OpportunityId,
        /// Attempts made.
        attempts: u32,
    },

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
