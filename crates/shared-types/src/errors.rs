//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors raised by the opportunity directory and investment repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Insert collided with an existing record.
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// Write would break a data-model invariant.
    #[error("Invalid record {id}: {reason}")]
    Invalid {
        /// Record key.
        id: String,
        /// Invariant broken.
        reason: &'static str,
    },

    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}
