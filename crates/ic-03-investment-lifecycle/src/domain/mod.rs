//! # Domain Module
//!
//! Lifecycle configuration, confirmation options and errors.

pub mod config;
pub mod errors;

pub use config::*;
pub use errors::*;
