//! # IC-03 Investment Lifecycle
//!
//! Owns the validated state transitions of one investment.
//!
//! **Subsystem ID:** 3  
//! **Architecture:** Hexagonal (Domain + Ports + Service)
//!
//! ## State Machine
//!
//! ```text
//! [PENDING] ──confirm──→ [CONFIRMED] ──refund / cancel──→ [REFUNDED]
//!     │
//!     ├──cancel──→ [CANCELLED]
//!     └──fail────→ [FAILED]
//! ```
//!
//! Any other edge is `InvalidTransition { from, to }`. Terminal states are
//! never left. Only `confirmed` holds capacity.
//!
//! ## Confirmation
//!
//! 1. Re-check the opportunity and the amount (admission controller)
//! 2. Reserve capacity and flip the status inside one ledger critical section
//! 3. Schedule the mint (settlement reconciler) and publish the event
//!
//! A rejected confirmation leaves the investment `pending` and the funding
//! untouched.
//!
//! ## Outbound Dependencies
//!
//! | Port | Purpose |
//! |------|---------|
//! | `InvestmentRepository` | status compare-and-set |
//! | `CapacityLedger` | reserve / release |
//! | `SettlementScheduler` | mint and compensation jobs |
//! | `EventPublisher` | operator feed |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{ConfirmOptions, LifecycleConfig, LifecycleError, LifecycleResult};
pub use ports::LifecycleApi;
pub use service::LifecycleService;
