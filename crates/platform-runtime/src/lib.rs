//! # Investment Core Runtime
//!
//! Wires the five subsystems and runs their background work.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and subsystem wiring
//! - `handlers/` - operator feed, retry sweep, periodic audit
//! - `console` - operator commands
//!
//! ## Background Tasks
//!
//! ```text
//! Lifecycle ──schedule──→ SettlementQueue ──→ SettlementWorker ──→ chain
//!                               ↑
//!                     RetrySweepHandler (interval)
//!
//! AuditHandler (interval) ──→ ConsistencyAuditor ──→ ReconciliationMismatch
//!
//! Event Bus ──→ OperatorFeedHandler ──→ logs + Prometheus metrics
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults + `IC_*` environment)
//! 2. Build the container (Subsystem 1 → 5)
//! 3. Spawn the operator feed, settlement worker and sweeps
//! 4. Optionally seed a demo opportunity

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod console;
pub mod container;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ic_04_settlement::SettlementApi;
use shared_bus::EventFilter;
use shared_types::{InvestmentOpportunity, OpportunityDirectory, OpportunityStatus};
use tokio::sync::watch;
use tracing::{error, info};

pub use console::{ConsoleReply, OperatorConsole};
pub use container::{load_config, ConfigError, PlatformConfig, PlatformContainer};

use crate::handlers::{AuditHandler, OperatorFeedHandler, RetrySweepHandler};

/// The runtime orchestrating all subsystems.
pub struct PlatformRuntime {
    container: Arc<PlatformContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PlatformRuntime {
    /// Create a runtime with configuration.
    pub fn new(config: PlatformConfig) -> Self {
        info!("Creating investment core runtime");
        let container = Arc::new(PlatformContainer::new(config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn background tasks.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Investment Core Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let config = &self.container.config.runtime;

        let feed =
            OperatorFeedHandler::new(self.container.event_bus.event_stream(EventFilter::all()));
        self.spawn("feed", feed.run());

        let worker = self
            .container
            .take_settlement_worker()
            .context("settlement worker already started")?;
        tokio::spawn(worker.run(self.shutdown_rx.clone()));

        if config.retry_sweep_interval_secs > 0 {
            let sweep = RetrySweepHandler::new(
                self.container.settlement.clone(),
                self.container.queue.clone(),
                Duration::from_secs(config.retry_sweep_interval_secs),
            );
            self.spawn("ic-04", sweep.run());
        }

        if config.audit_interval_secs > 0 {
            let audit = AuditHandler::new(
                self.container.auditor.clone(),
                Duration::from_secs(config.audit_interval_secs),
            );
            self.spawn("ic-05", audit.run());
        }

        if config.seed_demo {
            self.seed_demo().await?;
        }

        info!("All subsystems initialized and running");
        Ok(())
    }

    fn spawn<F>(&self, tag: &'static str, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task => {}
                _ = shutdown.changed() => {
                    info!("[{}] Shutdown signal received", tag);
                }
            }
        });
    }

    async fn seed_demo(&self) -> Result<()> {
        let opportunity = InvestmentOpportunity::new("Demo Harbour Bond", "DHB", 1_000_000, 1_000)
            .with_status(OpportunityStatus::Active);
        let id = opportunity.id;
        self.container
            .directory
            .insert(opportunity)
            .context("Failed to register demo opportunity")?;
        let binding = self
            .container
            .settlement
            .deploy_contract(id)
            .await
            .context("Failed to deploy demo contract")?;
        info!(
            "Demo opportunity {} live at {}",
            id,
            shared_types::to_hex(&binding.contract_address)
        );
        Ok(())
    }

    /// Signal all background tasks to stop.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!("Shutdown complete");
    }

    /// Shared container.
    pub fn container(&self) -> Arc<PlatformContainer> {
        Arc::clone(&self.container)
    }

    /// Operator console over this runtime.
    pub fn console(&self) -> OperatorConsole {
        OperatorConsole::new(self.container())
    }
}
