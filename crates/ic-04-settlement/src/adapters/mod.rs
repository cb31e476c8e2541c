//! # Adapters
//!
//! - `in_memory_chain`: simulated bond-token chain with fault injection

pub mod in_memory_chain;

pub use in_memory_chain::InMemoryChain;
