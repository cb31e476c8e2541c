//! # Domain Errors
//!
//! Rejection reasons of the Admission Controller. Each renders as text an
//! operator or investor can read as-is.

use shared_types::{Amount, OpportunityId, OpportunityStatus, StoreError, Timestamp};
use thiserror::Error;

/// Admission error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Unknown opportunity.
    #[error("Opportunity not found: {0}")]
    OpportunityNotFound(OpportunityId),

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

    /// The stored opportunity breaks a data-model invariant.
    #[error("Opportunity is misconfigured: {reason}")]
    OpportunityMisconfigured {
        /// Invariant broken.
        reason: &'static str,
    },

    /// Fewer than one bond requested.
    #[error("Invalid bond count: {0}")]
    InvalidBondCount(u64),

    /// Malformed request field.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// `bonds × price` does not fit in an amount.
    #[error("Amount overflow for {bonds} bonds")]
    AmountOverflow {
        /// Bonds requested.
        bonds: u64,
    },

    /// Soft check: the amount is larger than what is left.
    #[error("Exceeds remaining capacity: {remaining} remaining, {attempted} requested")]
    ExceedsRemainingCapacity {
        /// Capacity left at check time.
        remaining: Amount,
        /// Requested amount.
        attempted: Amount,
    },

    /// The price moved between submission and confirmation.
    #[error("Amount drift: snapshot {snapshot}, now {recomputed}, tolerance {tolerance}")]
    AmountDrift {
        /// Amount fixed at submission.
        snapshot: Amount,
        /// Amount at today's price.
        recomputed: Amount,
        /// Allowed absolute difference.
        tolerance: Amount,
    },

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
