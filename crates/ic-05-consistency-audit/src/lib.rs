//! # Consistency Auditor (Subsystem 5)
//!
//! Read-only sweep comparing the internal ledger with the chain. The ledger
//! is authoritative for financial state; the chain mirrors it. Divergence is
//! reported to operators and never repaired automatically.
//!
//! ## Classification
//!
//! | Verdict | When |
//! |---------|------|
//! | `matched` | wallet balance equals the ledger's figure |
//! | `pending-mint` | no mint recorded, no error, within `pending_mint_grace_ms` |
//! | `mismatched` | chain error recorded, wrong balance, overdue, or query failed |
//! | `no-contract` | opportunity has no deployed contract |
//!
//! Balances are per address, so expectations are summed over the wallet's
//! confirmed investments on the opportunity.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::SettlementBalanceReader;
pub use domain::{
    AuditConfig, AuditCounts, AuditError, AuditReport, AuditResult, ChainReconciliationRecord,
    Classification, MismatchReason, WalletPosition,
};
pub use ports::{AuditApi, BalanceReader};
pub use service::ConsistencyAuditor;
