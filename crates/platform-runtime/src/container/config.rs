//! # Platform Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//! Every value has a default; `IC_*` environment variables override them.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `IC_LEDGER_MAX_CAS_RETRIES` | `ledger.max_cas_retries` |
//! | `IC_AUTO_CLOSE_ON_TARGET` | `ledger.auto_close_on_target` |
//! | `IC_AMOUNT_DRIFT_TOLERANCE` | `lifecycle.amount_drift_tolerance` |
//! | `IC_MINT_MAX_ATTEMPTS` | `settlement.max_attempts` |
//! | `IC_MINT_INITIAL_BACKOFF_MS` | `settlement.initial_backoff_ms` |
//! | `IC_MINT_MAX_BACKOFF_MS` | `settlement.max_backoff_ms` |
//! | `IC_CHAIN_CALL_TIMEOUT_MS` | `settlement.call_timeout_ms` |
//! | `IC_MINT_MAX_TOTAL_ATTEMPTS` | `settlement.max_total_attempts` |
//! | `IC_TREASURY_ADDRESS` | `settlement.treasury_address` (40 hex chars) |
//! | `IC_PENDING_MINT_GRACE_MS` | `audit.pending_mint_grace_ms` |
//! | `IC_AUDIT_INTERVAL_SECS` | `runtime.audit_interval_secs` (0 disables) |
//! | `IC_RETRY_SWEEP_INTERVAL_SECS` | `runtime.retry_sweep_interval_secs` (0 disables) |
//! | `IC_EVENT_CHANNEL_CAPACITY` | `runtime.event_channel_capacity` |
//! | `IC_SEED_DEMO` | `runtime.seed_demo` |

use ic_01_capacity_ledger::LedgerConfig;
use ic_03_investment_lifecycle::LifecycleConfig;
use ic_04_settlement::SettlementConfig;
use ic_05_consistency_audit::AuditConfig;
use shared_types::parse_address;
use std::str::FromStr;
use thiserror::Error;

/// Complete platform configuration.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    /// Capacity ledger configuration.
    pub ledger: LedgerConfig,
    /// Lifecycle configuration.
    pub lifecycle: LifecycleConfig,
    /// Settlement reconciler configuration.
    pub settlement: SettlementConfig,
    /// Consistency auditor configuration.
    pub audit: AuditConfig,
    /// Background task configuration.
    pub runtime: RuntimeConfig,
}

/// Background task configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Seconds between audit sweeps.
    pub audit_interval_secs: u64,
    /// Seconds between retry sweeps.
    pub retry_sweep_interval_secs: u64,
    /// Capacity of the shared event bus.
    pub event_channel_capacity: usize,
    /// Register and deploy a demo opportunity at start.
    pub seed_demo: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            audit_interval_secs: 300,
            retry_sweep_interval_secs: 60,
            event_channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            seed_demo: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("{var}: cannot parse {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Compensation would burn bonds to the zero address.
    #[error("Treasury address is the zero address; set IC_TREASURY_ADDRESS")]
    ZeroTreasury,

    /// A limit that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

impl PlatformConfig {
    /// Configuration for tests: short timeouts, no background sweeps.
    pub fn for_testing() -> Self {
        Self {
            ledger: LedgerConfig::for_testing(),
            lifecycle: LifecycleConfig::for_testing(),
            settlement: SettlementConfig::for_testing(),
            audit: AuditConfig::for_testing(),
            runtime: RuntimeConfig {
                audit_interval_secs: 0,
                retry_sweep_interval_secs: 0,
                ..RuntimeConfig::default()
            },
        }
    }

    /// Apply overrides from `lookup` (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Overrides { lookup: &lookup };

        env.parse("IC_LEDGER_MAX_CAS_RETRIES", &mut self.ledger.max_cas_retries)?;
        env.flag("IC_AUTO_CLOSE_ON_TARGET", &mut self.ledger.auto_close_on_target)?;
        env.parse(
            "IC_AMOUNT_DRIFT_TOLERANCE",
            &mut self.lifecycle.amount_drift_tolerance,
        )?;
        env.parse("IC_MINT_MAX_ATTEMPTS", &mut self.settlement.max_attempts)?;
        env.parse(
            "IC_MINT_INITIAL_BACKOFF_MS",
            &mut self.settlement.initial_backoff_ms,
        )?;
        env.parse("IC_MINT_MAX_BACKOFF_MS", &mut self.settlement.max_backoff_ms)?;
        env.parse("IC_CHAIN_CALL_TIMEOUT_MS", &mut self.settlement.call_timeout_ms)?;
        env.parse(
            "IC_MINT_MAX_TOTAL_ATTEMPTS",
            &mut self.settlement.max_total_attempts,
        )?;
        if let Some(value) = lookup("IC_TREASURY_ADDRESS") {
            self.settlement.treasury_address =
                parse_address(&value).ok_or(ConfigError::InvalidValue {
                    var: "IC_TREASURY_ADDRESS",
                    value,
                })?;
        }
        env.parse("IC_PENDING_MINT_GRACE_MS", &mut self.audit.pending_mint_grace_ms)?;
        env.parse("IC_AUDIT_INTERVAL_SECS", &mut self.runtime.audit_interval_secs)?;
        env.parse(
            "IC_RETRY_SWEEP_INTERVAL_SECS",
            &mut self.runtime.retry_sweep_interval_secs,
        )?;
        env.parse(
            "IC_EVENT_CHANNEL_CAPACITY",
            &mut self.runtime.event_channel_capacity,
        )?;
        env.flag("IC_SEED_DEMO", &mut self.runtime.seed_demo)?;

        Ok(self)
    }

    /// Reject values that would make the platform misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settlement.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit("IC_MINT_MAX_ATTEMPTS"));
        }
        if self.ledger.max_cas_retries == 0 {
            return Err(ConfigError::ZeroLimit("IC_LEDGER_MAX_CAS_RETRIES"));
        }
        if self.runtime.event_channel_capacity == 0 {
            return Err(ConfigError::ZeroLimit("IC_EVENT_CHANNEL_CAPACITY"));
        }
        Ok(())
    }

    /// Stricter checks for non-dev deployments.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.settlement.treasury_address == [0u8; 20] {
            return Err(ConfigError::ZeroTreasury);
        }
        Ok(())
    }
}

struct Overrides<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Overrides<'_, F> {
    fn parse<T: FromStr>(&self, var: &'static str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = (self.lookup)(var) {
            *target = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var, value })?;
        }
        Ok(())
    }

    fn flag(&self, var: &'static str, target: &mut bool) -> Result<(), ConfigError> {
        if let Some(value) = (self.lookup)(var) {
            *target = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidValue { var, value }),
            };
        }
        Ok(())
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<PlatformConfig, ConfigError> {
    let config = PlatformConfig::default().with_overrides(|var| std::env::var(var).ok())?;
    config.validate()?;
    Ok(config)
}
