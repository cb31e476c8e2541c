//! # IC-01 Capacity Ledger
//!
//! Source of truth for how much of each opportunity's cap has been raised.
//!
//! **Subsystem ID:** 1  
//! **Architecture:** Hexagonal (Domain + Ports + Service)
//!
//! ## Purpose
//!
//! Tracks `current_funding` against the effective cap and offers the two
//! atomic primitives every other subsystem goes through:
//! - `reserve(opportunity, amount)` adds funding only if it fits
//! - `release(opportunity, amount)` subtracts funding, never below zero
//!
//! ## Concurrency
//!
//! | Layer | Guarantee |
//! |-------|-----------|
//! | Per-opportunity mutex | Writers of one opportunity are serialized in-process |
//! | Compare-and-set on the stored counter | Stale reads from other writers are rejected |
//! | Bounded retry | `Contention` instead of spinning forever |
//!
//! Contention is scoped to one opportunity. Unrelated opportunities never
//! wait on each other.
//!
//! ## Cap
//!
//! ```text
//! cap = min(max_investment, total_funding_target)   if max_investment is set
//!     = total_funding_target                        otherwise
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! ic-01-capacity-ledger/
//! ├── domain/     # CapacitySnapshot, LedgerConfig, LedgerError
//! ├── ports/      # CapacityApi
//! └── service.rs  # CapacityLedger
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{CapacitySnapshot, LedgerConfig, LedgerError, LedgerResult};
pub use ports::CapacityApi;
pub use service::CapacityLedger;
