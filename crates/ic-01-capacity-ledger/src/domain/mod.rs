//! # Domain Module
//!
//! Capacity snapshots, ledger configuration and errors.

pub mod errors;
pub mod snapshot;

pub use errors::*;
pub use snapshot::*;
