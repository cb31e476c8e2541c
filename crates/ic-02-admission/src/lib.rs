//! # IC-02 Admission Controller
//!
//! Decides whether a new investment may enter the lifecycle, and re-checks
//! it when an operator confirms.
//!
//! **Subsystem ID:** 2  
//! **Architecture:** Hexagonal (Domain + Ports + Service)
//!
//! ## Checks
//!
//! | Check | `admit` | `recheck_for_confirmation` |
//! |-------|---------|----------------------------|
//! | Opportunity exists | ✓ | ✓ |
//! | `status == active`, not past `closes_at` | ✓ | ✓ |
//! | `bonds ≥ 1` | ✓ | |
//! | `bonds × price ≤ remaining` (soft) | ✓ | |
//! | Amount drift within tolerance | | ✓ |
//!
//! Neither check reserves capacity. The capacity check that counts is the
//! capacity ledger's `reserve`, run inside confirmation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{
    AdmissionError, AdmissionRequest, AdmissionResult, ConfirmationCheck, RecheckOptions,
};
pub use ports::AdmissionApi;
pub use service::AdmissionController;
