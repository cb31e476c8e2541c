//! # Settlement Queue and Worker
//!
//! `SettlementQueue` is the scheduler the lifecycle writes to. A single
//! `SettlementWorker` drains it, so the mint and the compensation for one
//! investment are never reordered.

use crate::domain::{SettlementOutcome, SettlementResult};
use crate::ports::SettlementApi;
use shared_types::{SettlementJob, SettlementScheduler};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Unbounded job queue implementing `SettlementScheduler`.
#[derive(Clone, Debug)]
pub struct SettlementQueue {
    sender: mpsc::UnboundedSender<SettlementJob>,
}

impl SettlementQueue {
    /// Create a queue and the receiver a worker drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SettlementJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SettlementScheduler for SettlementQueue {
    fn schedule(&self, job: SettlementJob) -> bool {
        self.sender.send(job).is_ok()
    }
}

/// Serial consumer of settlement jobs.
pub struct SettlementWorker<S: SettlementApi + ?Sized> {
    settlement: Arc<S>,
    receiver: mpsc::UnboundedReceiver<SettlementJob>,
}

impl<S: SettlementApi + ?Sized> SettlementWorker<S> {
    /// Create a worker over `receiver`.
    pub fn new(settlement: Arc<S>, receiver: mpsc::UnboundedReceiver<SettlementJob>) -> Self {
        Self {
            settlement,
            receiver,
        }
    }

    /// Run one job.
    pub async fn process(&self, job: SettlementJob) -> SettlementResult<SettlementOutcome> {
        match job {
            SettlementJob::Mint(id) => self.settlement.on_confirmed(id).await,
            SettlementJob::Compensate(id) => self.settlement.compensate(id).await,
        }
    }

    async fn handle(&self, job: SettlementJob) {
        match self.process(job).await {
            Ok(SettlementOutcome::Skipped(reason)) => {
                debug!("[ic-04] {:?} skipped: {}", job, reason)
            }
            Ok(outcome) => debug!("[ic-04] {:?} -> {:?}", job, outcome),
            // The confirmation stands; the retry sweep picks it up
            Err(e) => warn!("[ic-04] {:?} failed: {}", job, e),
        }
    }

    /// Process jobs until the queue closes or shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("[ic-04] Settlement worker started");
        loop {
            tokio::select! {
                job = self.receiver.recv() => match job {
                    Some(job) => self.handle(job).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("[ic-04] Settlement worker shutting down");
                    break;
                }
            }
        }
    }

    /// Process everything queued right now. Returns the jobs run.
    pub async fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(job) = self.receiver.try_recv() {
            self.handle(job).await;
            processed += 1;
        }
        processed
    }
}
