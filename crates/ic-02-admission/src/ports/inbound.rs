//! # Inbound Ports
//!
//! API trait defining what the Admission Controller can do.

use crate::domain::{AdmissionError, AdmissionRequest, ConfirmationCheck, RecheckOptions};
use shared_types::Investment;

/// Admission controller API - inbound port.
pub trait AdmissionApi: Send + Sync {
    /// Soft admission. Produces a `pending` investment; holds no capacity.
    fn admit(&self, request: AdmissionRequest) -> Result<Investment, AdmissionError>;

    /// Hard re-check run by confirmation before reserving capacity.
    fn recheck_for_confirmation(
        &self,
        investment: &Investment,
        options: RecheckOptions,
    ) -> Result<ConfirmationCheck, AdmissionError>;
}
