//! # Background Handlers
//!
//! - `feed`: operator event feed (logs and metrics)
//! - `sweeps`: periodic retry sweep and audit

pub mod feed;
pub mod sweeps;

pub use feed::{record_metrics, OperatorFeedHandler};
pub use sweeps::{AuditHandler, RetrySweepHandler};
