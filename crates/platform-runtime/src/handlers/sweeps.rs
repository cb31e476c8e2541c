//! # Periodic Sweeps
//!
//! - `RetrySweepHandler` re-queues failed mints and pending compensations
//! - `AuditHandler` runs a full consistency audit
//!
//! Both tick on a fixed interval; the first tick runs one interval after
//! start so the platform can settle.

use std::sync::Arc;
use std::time::Duration;

use ic_04_settlement::{SettlementApi, SettlementQueue};
use ic_05_consistency_audit::AuditApi;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

fn ticker(every: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Re-queues settlement work left behind by failures.
pub struct RetrySweepHandler<S: SettlementApi + ?Sized> {
    settlement: Arc<S>,
    queue: SettlementQueue,
    every: Duration,
}

impl<S: SettlementApi + ?Sized> RetrySweepHandler<S> {
    /// Create a sweep running every `every`.
    pub fn new(settlement: Arc<S>, queue: SettlementQueue, every: Duration) -> Self {
        Self {
            settlement,
            queue,
            every,
        }
    }

    /// Run one sweep. Returns the jobs queued.
    pub fn sweep(&self) -> usize {
        match self.settlement.requeue_failed(&self.queue) {
            Ok(queued) => queued,
            Err(e) => {
                error!("[ic-04] Retry sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweep forever.
    pub async fn run(self) {
        info!("[ic-04] Retry sweep every {:?}", self.every);
        let mut interval = ticker(self.every);
        loop {
            interval.tick().await;
            let queued = self.sweep();
            debug!("[ic-04] Retry sweep queued {} jobs", queued);
        }
    }
}

/// Runs the consistency audit on a schedule.
pub struct AuditHandler<A: AuditApi + ?Sized> {
    auditor: Arc<A>,
    every: Duration,
}

impl<A: AuditApi + ?Sized> AuditHandler<A> {
    /// Create a handler auditing every `every`.
    pub fn new(auditor: Arc<A>, every: Duration) -> Self {
        Self { auditor, every }
    }

    /// Audit forever. Findings reach operators through the event feed.
    pub async fn run(self) {
        info!("[ic-05] Periodic audit every {:?}", self.every);
        let mut interval = ticker(self.every);
        loop {
            interval.tick().await;
            if let Err(e) = self.auditor.audit(None).await {
                error!("[ic-05] Periodic audit failed: {}", e);
            }
        }
    }
}
