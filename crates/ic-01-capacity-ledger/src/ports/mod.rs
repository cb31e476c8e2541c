//! # Ports
//!
//! Inbound API of the capacity ledger. The outbound side is the shared
//! `OpportunityDirectory` store port.

pub mod inbound;

pub use inbound::*;
