//! # Ports
//!
//! Inbound API of the lifecycle. Outbound dependencies are the shared
//! store ports, the `SettlementScheduler` and the event bus publisher.

pub mod inbound;

pub use inbound::*;
