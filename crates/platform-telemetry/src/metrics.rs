//! Prometheus metrics for the investment core.
//!
//! All metrics follow the naming convention: `ic_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LIFECYCLE METRICS (Subsystems 2, 3)
    // =========================================================================

    /// Lifecycle transitions by outcome.
    pub static ref LIFECYCLE_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("ic_lifecycle_transitions_total", "Investment lifecycle transitions"),
        &["transition"]  // admitted/confirmed/rejected/cancelled/failed/refunded
    ).expect("metric creation failed");

    /// Confirmed funding per opportunity, in minor units.
    pub static ref FUNDING_RAISED: GaugeVec = GaugeVec::new(
        Opts::new("ic_ledger_funding_raised", "Confirmed funding per opportunity"),
        &["opportunity"]
    ).expect("metric creation failed");

    // =========================================================================
    // SETTLEMENT METRICS (Subsystem 4)
    // =========================================================================

    /// Successful mints.
    pub static ref MINTS_RECORDED: Counter = Counter::new(
        "ic_settlement_mints_recorded_total",
        "Total mints recorded on the chain"
    ).expect("metric creation failed");

    /// Failed mint attempts.
    pub static ref MINT_FAILURES: Counter = Counter::new(
        "ic_settlement_mint_failures_total",
        "Total failed mint attempts"
    ).expect("metric creation failed");

    /// Transfer-back compensations.
    pub static ref COMPENSATIONS_RECORDED: Counter = Counter::new(
        "ic_settlement_compensations_total",
        "Total compensating transfers recorded"
    ).expect("metric creation failed");

    // =========================================================================
    // AUDIT METRICS (Subsystem 5)
    // =========================================================================

    /// Mismatches found by the auditor.
    pub static ref RECONCILIATION_MISMATCHES: Counter = Counter::new(
        "ic_audit_mismatches_total",
        "Ledger/chain mismatches reported by the auditor"
    ).expect("metric creation failed");

    /// Audit records by classification.
    pub static ref AUDIT_CLASSIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("ic_audit_records_total", "Audit records by classification"),
        &["classification"]  // matched/pending_mint/mismatched/no_contract
    ).expect("metric creation failed");

    /// Mismatched records in the last audit sweep.
    pub static ref LAST_AUDIT_MISMATCHED: Gauge = Gauge::new(
        "ic_audit_last_mismatched",
        "Mismatched records in the most recent audit"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(LIFECYCLE_TRANSITIONS.clone()),
        Box::new(FUNDING_RAISED.clone()),
        Box::new(MINTS_RECORDED.clone()),
        Box::new(MINT_FAILURES.clone()),
        Box::new(COMPENSATIONS_RECORDED.clone()),
        Box::new(RECONCILIATION_MISMATCHES.clone()),
        Box::new(AUDIT_CLASSIFICATIONS.clone()),
        Box::new(LAST_AUDIT_MISMATCHED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_encode() {
        // May fail if another test registered first, which is fine
        let _ = register_metrics();
        MINTS_RECORDED.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("ic_settlement_mints_recorded_total"));
    }

    #[test]
    fn test_labelled_counter() {
        LIFECYCLE_TRANSITIONS
            .with_label_values(&["confirmed"])
            .inc();
        assert!(LIFECYCLE_TRANSITIONS.with_label_values(&["confirmed"]).get() >= 1.0);
    }

    #[test]
    fn test_gauge_set() {
        LAST_AUDIT_MISMATCHED.set(3.0);
        assert_eq!(LAST_AUDIT_MISMATCHED.get(), 3.0);
    }
}
