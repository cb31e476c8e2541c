//! # Lifecycle Configuration

use ic_02_admission::RecheckOptions;
use shared_types::Amount;

/// Lifecycle configuration.
#[derive(Clone, Debug, Default)]
pub struct LifecycleConfig {
    /// Allowed absolute difference between the submitted amount and the
    /// amount at confirmation-time price.
    pub amount_drift_tolerance: Amount,
}

impl LifecycleConfig {
    /// Configuration for tests: exact amounts only.
    pub fn for_testing() -> Self {
        Self {
            amount_drift_tolerance: 0,
        }
    }
}

/// Operator options for a confirmation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfirmOptions {
    /// Confirm at the submitted amount even if the price drifted.
    pub accept_amount_drift: bool,
}

impl ConfirmOptions {
    /// Options with the drift override set.
    pub fn accepting_drift() -> Self {
        Self {
            accept_amount_drift: true,
        }
    }

    pub(crate) fn recheck(self, config: &LifecycleConfig) -> RecheckOptions {
        RecheckOptions {
            amount_drift_tolerance: config.amount_drift_tolerance,
            accept_amount_drift: self.accept_amount_drift,
        }
    }
}
