//! # Inbound Ports
//!
//! API trait defining what the Investment Lifecycle can do.

use crate::domain::{ConfirmOptions, LifecycleError};
use async_trait::async_trait;
use ic_02_admission::AdmissionRequest;
use shared_types::{Investment, InvestmentId};

/// Investment lifecycle API - inbound port.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Admit and persist a new `pending` investment.
    async fn submit(&self, request: AdmissionRequest) -> Result<Investment, LifecycleError>;

    /// `pending → confirmed`: re-check, reserve, schedule the mint.
    async fn confirm(
        &self,
        id: InvestmentId,
        options: ConfirmOptions,
    ) -> Result<Investment, LifecycleError>;

    /// `pending → cancelled`, or for a confirmed investment release and
    /// compensate, ending in `refunded`.
    async fn cancel(&self, id: InvestmentId, reason: String) -> Result<Investment, LifecycleError>;

    /// `confirmed → refunded`: release exactly `amount`, schedule compensation.
    async fn refund(&self, id: InvestmentId) -> Result<Investment, LifecycleError>;

    /// `pending → failed` on payment or validation failure.
    async fn fail(&self, id: InvestmentId, reason: String) -> Result<Investment, LifecycleError>;

    /// Current state of one investment.
    fn get(&self, id: InvestmentId) -> Result<Investment, LifecycleError>;
}
