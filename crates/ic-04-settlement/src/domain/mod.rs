//! # Domain Module
//!
//! Chain value objects, reconciler configuration, outcomes and errors.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
