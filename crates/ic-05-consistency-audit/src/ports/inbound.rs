//! # Inbound Ports

use crate::domain::{AuditError, AuditReport};
use async_trait::async_trait;
use shared_types::OpportunityId;

/// Consistency auditor API - inbound port.
#[async_trait]
pub trait AuditApi: Send + Sync {
    /// Compare ledger and chain for one opportunity, or all when `None`.
    ///
    /// Read-only: mismatches are reported, never repaired.
    async fn audit(&self, opportunity_id: Option<OpportunityId>)
        -> Result<AuditReport, AuditError>;
}
