//! # Domain Module
//!
//! Audit records, classification rules and errors.

pub mod config;
pub mod errors;
pub mod record;

pub use config::*;
pub use errors::*;
pub use record::*;
