//! # Adapters

pub mod settlement_reader;

pub use settlement_reader::SettlementBalanceReader;
