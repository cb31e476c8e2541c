//! # Ports
//!
//! - `inbound`: what the reconciler offers (`SettlementApi`)
//! - `outbound`: what it needs from the chain (`BlockchainGateway`)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
