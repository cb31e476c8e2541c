//! # Settlement Reconciler (Subsystem 4)
//!
//! Mirrors confirmed investments onto the bond-token chain: mints after
//! confirmation, transfers bonds back after a refund, and exposes fresh
//! balance reads to the consistency auditor.
//!
//! ## Flow
//!
//! ```text
//! Lifecycle ──schedule(Mint/Compensate)──→ SettlementQueue
//!                                              │
//!                                              ↓
//!                                      SettlementWorker (serial)
//!                                              │
//!                                              ↓
//!                                     SettlementReconciler
//!                         dedupe (tx hash → completed → in-flight)
//!                         timeout + capped backoff per gateway call
//!                                              │
//!                                              ↓
//!                                     BlockchainGateway
//! ```
//!
//! ## Failure policy
//!
//! | Situation | Result |
//! |-----------|--------|
//! | No wallet | `Skipped(NoWallet)`, confirmation stands |
//! | No active contract | `Skipped(NoContract)` |
//! | Transient chain error | retry with backoff, `blockchain_error` recorded |
//! | Retries exhausted | `BlockchainUnavailable`, investment stays `confirmed` |
//! | Sweep ceiling reached | `AttemptsExhausted`; operator `retry_mint` still works |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod queue;
pub mod service;

pub use adapters::InMemoryChain;
pub use domain::{
    token_balance_for, BondBalance, ChainError, DeployParams, DeployReceipt, SettlementConfig,
    SettlementError, SettlementOutcome, SettlementResult, SkipReason, TxReceipt, TOKEN_UNIT,
};
pub use ports::{BlockchainGateway, SettlementApi};
pub use queue::{SettlementQueue, SettlementWorker};
pub use service::SettlementReconciler;
