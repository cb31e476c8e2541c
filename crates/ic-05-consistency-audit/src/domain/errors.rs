//! # Domain Errors

use shared_types::{OpportunityId, StoreError};
use thiserror::Error;

/// Consistency auditor errors.
///
/// Chain failures are never errors here; they become `mismatched` records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Unknown opportunity.
    #[error("Opportunity not found: {0}")]
    OpportunityNotFound(OpportunityId),

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
