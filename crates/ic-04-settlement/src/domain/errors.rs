//! # Domain Errors
//!
//! `ChainError` is what the gateway reports; `SettlementError` is what the
//! reconciler reports. Neither ever reaches the confirm caller.

use shared_types::{InvestmentId, InvestmentStatus, OpportunityId, StoreError};
use thiserror::Error;

/// Errors reported by a blockchain gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Node unreachable or RPC failure.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// No answer within the call timeout.
    #[error("Chain call timed out after {after_ms}ms")]
    Timeout {
        /// Timeout applied.
        after_ms: u64,
    },

    /// No contract at the address (hex).
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    /// Sender holds fewer bonds than the transfer.
    #[error("Insufficient bonds: holder has {held}, transfer of {requested}")]
    InsufficientBonds {
        /// Bonds held.
        held: u64,
        /// Bonds requested.
        requested: u64,
    },

    /// The chain refused the transaction.
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

impl ChainError {
    /// Whether a retry with the same key can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Settlement reconciler errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Unknown investment.
    #[error("Investment not found: {0}")]
    InvestmentNotFound(InvestmentId),

    /// Unknown opportunity.
    #[error("Opportunity not found: {0}")]
    OpportunityNotFound(OpportunityId),

    /// The investment left the state the operation needs.
    #[error("Investment is {status}")]
    WrongStatus {
        /// Current status.
        status: InvestmentStatus,
    },

    /// The opportunity has no deployed contract.
    #[error("No deployed contract for {0}")]
    NoContract(OpportunityId),

    /// The opportunity already has an active contract.
    #[error("Contract already deployed for {0}")]
    AlreadyDeployed(OpportunityId),

    /// Retries exhausted; the record keeps `blockchain_error`.
    #[error("Blockchain unavailable after {attempts} attempts: {last_error}")]
    BlockchainUnavailable {
        /// Attempts made in this job.
        attempts: u32,
        /// Last gateway error, verbatim.
        last_error: String,
    },

    /// The retry sweep gave up on this investment.
    #[error("Mint attempts exhausted ({attempts})")]
    AttemptsExhausted {
        /// Attempts recorded.
        attempts: u32,
    },

    /// Gateway failure outside the retry loop.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;
