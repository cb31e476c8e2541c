//! # Platform Container
//!
//! Central container holding all subsystem instances with their shared
//! stores, event bus and settlement queue wired in.

pub mod config;
pub mod subsystems;

pub use config::{load_config, ConfigError, PlatformConfig, RuntimeConfig};
pub use subsystems::{
    Auditor, Directory, Ledger, Lifecycle, PlatformContainer, Reconciler, Repository,
};
