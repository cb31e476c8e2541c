//! # Platform Telemetry
//!
//! Structured logging and Prometheus metrics for the investment core.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use platform_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IC_SERVICE_NAME` | `investment-core` | Service name in logs |
//! | `IC_LOG_LEVEL` | `info` | Log level filter |
//! | `IC_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `IC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `IC_ENVIRONMENT` | `dev` | Deployment environment |

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, AUDIT_CLASSIFICATIONS, COMPENSATIONS_RECORDED,
    FUNDING_RAISED, LAST_AUDIT_MISMATCHED, LIFECYCLE_TRANSITIONS, MINTS_RECORDED, MINT_FAILURES,
    RECONCILIATION_MISMATCHES, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    /// A metric could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Call once at process start.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    // Metrics first (synchronous, no global subscriber needed)
    register_metrics()?;
    tracing_setup::init_tracing(&config)?;
    Ok(())
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
