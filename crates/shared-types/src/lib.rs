//! # Shared Types Crate
//!
//! This crate contains the domain entities, store ports and settlement
//! scheduling port shared by every subsystem of the investment core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Closed Status Enums**: Opportunity and investment statuses are tagged
//!   enums with an explicit transition table, never free-form strings.
//! - **Owned Counters**: `current_funding` is written through
//!   `OpportunityDirectory::compare_and_set_funding` by the capacity ledger
//!   and by nothing else.

pub mod entities;
pub mod errors;
pub mod settlement;
pub mod store;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use settlement::*;
pub use store::*;
pub use time::*;
