//! # Settlement Scheduling Port
//!
//! The lifecycle hands chain work to the settlement reconciler through this
//! port. Scheduling never blocks and never fails the financial transition
//! that triggered it.

use crate::entities::{InvestmentId, OpportunityId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain operation kinds that carry an idempotency key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementOperation {
    /// Mint the investment's bonds to the investor wallet.
    Mint,
    /// Move minted bonds back after a refund.
    TransferBack,
}

/// Deduplication key for chain operations.
///
/// The mint key is `(investment_id, opportunity_id)`; compensation adds the
/// operation tag so both can coexist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    /// Investment the operation settles.
    pub investment_id: InvestmentId,
    /// Opportunity whose contract is touched.
    pub opportunity_id: OpportunityId,
    /// Operation kind.
    pub operation: SettlementOperation,
}

impl IdempotencyKey {
    /// Key for the mint of an investment.
    pub fn mint(investment_id: InvestmentId, opportunity_id: OpportunityId) -> Self {
        Self {
            investment_id,
            opportunity_id,
            operation: SettlementOperation::Mint,
        }
    }

    /// Key for the transfer-back of an investment.
    pub fn transfer_back(investment_id: InvestmentId, opportunity_id: OpportunityId) -> Self {
        Self {
            investment_id,
            opportunity_id,
            operation: SettlementOperation::TransferBack,
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.operation {
            SettlementOperation::Mint => "mint",
            SettlementOperation::TransferBack => "transfer-back",
        };
        write!(f, "{}:{}:{}", op, self.investment_id.0, self.opportunity_id.0)
    }
}

/// A unit of asynchronous chain work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementJob {
    /// Mint after confirmation.
    Mint(InvestmentId),
    /// Compensate after a refund.
    Compensate(InvestmentId),
}

impl SettlementJob {
    /// The investment this job settles.
    pub fn investment_id(&self) -> InvestmentId {
        match self {
            Self::Mint(id) | Self::Compensate(id) => *id,
        }
    }
}

/// Outbound port used by the lifecycle to schedule chain work.
pub trait SettlementScheduler: Send + Sync {
    /// Enqueues a job. Returns false if the job could not be queued; the
    /// caller logs it and relies on the retry sweep.
    fn schedule(&self, job: SettlementJob) -> bool;
}

/// Scheduler that records jobs without running them.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    jobs: parking_lot::Mutex<Vec<SettlementJob>>,
}

impl RecordingScheduler {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs scheduled so far, in order.
    pub fn jobs(&self) -> Vec<SettlementJob> {
        self.jobs.lock().clone()
    }
}

impl SettlementScheduler for RecordingScheduler {
    fn schedule(&self, job: SettlementJob) -> bool {
        self.jobs.lock().push(job);
        true
    }
}
