//! # Operator Feed
//!
//! Subscribes to every platform event, writes one log line per event and
//! keeps the Prometheus metrics current. Delivery is best effort; the feed
//! never drives settlement.

use platform_telemetry::{
    metric_inc, AUDIT_CLASSIFICATIONS, COMPENSATIONS_RECORDED, FUNDING_RAISED,
    LAST_AUDIT_MISMATCHED, LIFECYCLE_TRANSITIONS, MINTS_RECORDED, MINT_FAILURES,
    RECONCILIATION_MISMATCHES,
};
use shared_bus::{EventStream, PlatformEvent};
use shared_types::{to_hex, Amount, OpportunityId};
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Handler draining the event stream into logs and metrics.
pub struct OperatorFeedHandler {
    stream: EventStream,
}

impl OperatorFeedHandler {
    /// Create a handler over `stream`.
    pub fn new(stream: EventStream) -> Self {
        Self { stream }
    }

    /// Run until the bus closes.
    pub async fn run(mut self) {
        info!("[feed] Operator feed started");
        while let Some(event) = self.stream.next().await {
            record_metrics(&event);
            log_event(&event);
        }
        info!("[feed] Event bus closed");
    }
}

fn set_funding(opportunity_id: &OpportunityId, current_funding: Amount) {
    FUNDING_RAISED
        .with_label_values(&[opportunity_id.to_string().as_str()])
        .set(current_funding as f64);
}

/// Update metrics for one event.
pub fn record_metrics(event: &PlatformEvent) {
    match event {
        PlatformEvent::InvestmentAdmitted { .. } => {
            metric_inc!(LIFECYCLE_TRANSITIONS, &["admitted"])
        }
        PlatformEvent::InvestmentConfirmed {
            opportunity_id,
            current_funding,
            ..
        } => {
            metric_inc!(LIFECYCLE_TRANSITIONS, &["confirmed"]);
            set_funding(opportunity_id, *current_funding);
        }
        PlatformEvent::ConfirmationRejected { .. } => {
            metric_inc!(LIFECYCLE_TRANSITIONS, &["rejected"])
        }
        PlatformEvent::InvestmentCancelled { .. } => {
            metric_inc!(LIFECYCLE_TRANSITIONS, &["cancelled"])
        }
        PlatformEvent::InvestmentFailed { .. } => metric_inc!(LIFECYCLE_TRANSITIONS, &["failed"]),
        PlatformEvent::InvestmentRefunded {
            opportunity_id,
            current_funding,
            ..
        } => {
            metric_inc!(LIFECYCLE_TRANSITIONS, &["refunded"]);
            set_funding(opportunity_id, *current_funding);
        }
        PlatformEvent::MintRecorded { .. } => metric_inc!(MINTS_RECORDED),
        PlatformEvent::MintFailed { .. } => metric_inc!(MINT_FAILURES),
        PlatformEvent::CompensationRecorded { .. } => metric_inc!(COMPENSATIONS_RECORDED),
        PlatformEvent::ReconciliationMismatch { .. } => metric_inc!(RECONCILIATION_MISMATCHES),
        PlatformEvent::AuditCompleted {
            matched,
            pending_mint,
            mismatched,
            no_contract,
            ..
        } => {
            for (label, count) in [
                ("matched", matched),
                ("pending_mint", pending_mint),
                ("mismatched", mismatched),
                ("no_contract", no_contract),
            ] {
                AUDIT_CLASSIFICATIONS
                    .with_label_values(&[label])
                    .inc_by(*count as f64);
            }
            LAST_AUDIT_MISMATCHED.set(*mismatched as f64);
        }
    }
}

fn log_event(event: &PlatformEvent) {
    match event {
        PlatformEvent::InvestmentAdmitted {
            investment_id,
            bonds,
            amount,
            ..
        } => info!("[feed] {} admitted: {} bonds for {}", investment_id, bonds, amount),
        PlatformEvent::InvestmentConfirmed {
            investment_id,
            current_funding,
            cap,
            ..
        } => info!(
            "[feed] {} confirmed: funding {}/{}",
            investment_id, current_funding, cap
        ),
        PlatformEvent::ConfirmationRejected {
            investment_id,
            reason,
            ..
        } => warn!("[feed] {} not confirmed: {}", investment_id, reason),
        PlatformEvent::InvestmentCancelled {
            investment_id,
            reason,
            ..
        } => info!("[feed] {} cancelled: {}", investment_id, reason),
        PlatformEvent::InvestmentFailed {
            investment_id,
            reason,
            ..
        } => info!("[feed] {} failed: {}", investment_id, reason),
        PlatformEvent::InvestmentRefunded {
            investment_id,
            released,
            ..
        } => info!("[feed] {} refunded: released {}", investment_id, released),
        PlatformEvent::MintRecorded {
            investment_id,
            tx_hash,
            bonds,
            ..
        } => info!(
            "[feed] {} minted {} bonds (tx {})",
            investment_id,
            bonds,
            to_hex(tx_hash)
        ),
        PlatformEvent::MintFailed {
            investment_id,
            attempt,
            error,
            ..
        } => warn!(
            "[feed] {} mint attempt {} failed: {}",
            investment_id, attempt, error
        ),
        PlatformEvent::CompensationRecorded {
            investment_id,
            tx_hash,
            ..
        } => info!(
            "[feed] {} bonds returned to treasury (tx {})",
            investment_id,
            to_hex(tx_hash)
        ),
        PlatformEvent::ReconciliationMismatch {
            investment_id,
            reason,
            ..
        } => warn!("[feed] RECONCILIATION MISMATCH {}: {}", investment_id, reason),
        PlatformEvent::AuditCompleted {
            matched,
            pending_mint,
            mismatched,
            no_contract,
            ..
        } => info!(
            "[feed] Audit: {} matched, {} pending-mint, {} mismatched, {} no-contract",
            matched, pending_mint, mismatched, no_contract
        ),
    }
}
