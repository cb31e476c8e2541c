//! # Operator Console
//!
//! Operator-facing commands over the container. Every reply is plain text;
//! funding shortfalls and chain mismatches are rendered with the reason
//! exactly as the subsystem reported it.

use std::fmt;
use std::sync::Arc;

use ic_01_capacity_ledger::CapacityApi;
use ic_03_investment_lifecycle::{ConfirmOptions, LifecycleApi};
use ic_04_settlement::{SettlementApi, SettlementOutcome};
use ic_05_consistency_audit::{AuditApi, AuditReport};
use shared_types::{to_hex, InvestmentId, OpportunityId};
use tracing::info;

use crate::container::PlatformContainer;

/// One console reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleReply {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Text shown to the operator.
    pub message: String,
}

impl ConsoleReply {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn rejected(reason: impl fmt::Display) -> Self {
        Self {
            ok: false,
            message: format!("rejected: {}", reason),
        }
    }
}

impl fmt::Display for ConsoleReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Operator console.
pub struct OperatorConsole {
    container: Arc<PlatformContainer>,
}

impl OperatorConsole {
    /// Console over `container`.
    pub fn new(container: Arc<PlatformContainer>) -> Self {
        Self { container }
    }

    /// Confirm a pending investment.
    pub async fn confirm(&self, id: InvestmentId, accept_amount_drift: bool) -> ConsoleReply {
        info!("[console] confirm {} (accept drift: {})", id, accept_amount_drift);
        let options = if accept_amount_drift {
            ConfirmOptions::accepting_drift()
        } else {
            ConfirmOptions::default()
        };
        match self.container.lifecycle.confirm(id, options).await {
            Ok(investment) => {
                let funding = self
                    .container
                    .ledger
                    .snapshot(&investment.opportunity_id)
                    .map(|s| format!(", funding {}/{}", s.current_funding, s.cap))
                    .unwrap_or_default();
                ConsoleReply::ok(format!(
                    "confirmed {}: {} reserved{}",
                    id, investment.amount, funding
                ))
            }
            Err(e) => ConsoleReply::rejected(e),
        }
    }

    /// Cancel an investment; a confirmed one is refunded.
    pub async fn cancel(&self, id: InvestmentId, reason: &str) -> ConsoleReply {
        info!("[console] cancel {}: {}", id, reason);
        match self.container.lifecycle.cancel(id, reason.to_string()).await {
            Ok(investment) => ConsoleReply::ok(format!("{} is now {}", id, investment.status)),
            Err(e) => ConsoleReply::rejected(e),
        }
    }

    /// Refund a confirmed investment.
    pub async fn refund(&self, id: InvestmentId) -> ConsoleReply {
        info!("[console] refund {}", id);
        match self.container.lifecycle.refund(id).await {
            Ok(investment) => ConsoleReply::ok(format!(
                "refunded {}: released {}",
                id, investment.amount
            )),
            Err(e) => ConsoleReply::rejected(e),
        }
    }

    /// Re-run the mint for a confirmed investment.
    pub async fn retry_mint(&self, id: InvestmentId) -> ConsoleReply {
        info!("[console] retry mint {}", id);
        match self.container.settlement.retry_mint(id).await {
            Ok(SettlementOutcome::Minted {
                tx_hash,
                on_chain_bonds,
                wallet_bonds,
            }) => ConsoleReply::ok(format!(
                "minted {} bonds for {}: wallet holds {} (tx {})",
                on_chain_bonds,
                id,
                wallet_bonds,
                to_hex(&tx_hash)
            )),
            Ok(SettlementOutcome::AlreadySettled { tx_hash }) => {
                ConsoleReply::ok(format!("{} already minted (tx {})", id, to_hex(&tx_hash)))
            }
            Ok(SettlementOutcome::Skipped(reason)) => {
                ConsoleReply::rejected(format!("mint skipped: {}", reason))
            }
            Ok(SettlementOutcome::InFlight) => {
                ConsoleReply::ok(format!("mint for {} already in progress", id))
            }
            Ok(SettlementOutcome::Compensated { .. }) => {
                ConsoleReply::rejected("unexpected compensation outcome")
            }
            Err(e) => ConsoleReply::rejected(e),
        }
    }

    /// Audit one opportunity or all.
    pub async fn audit(&self, opportunity_id: Option<OpportunityId>) -> ConsoleReply {
        info!("[console] audit {:?}", opportunity_id);
        match self.container.auditor.audit(opportunity_id).await {
            Ok(report) => ConsoleReply {
                ok: report.counts.mismatched == 0,
                message: render_report(&report),
            },
            Err(e) => ConsoleReply::rejected(e),
        }
    }

    /// Capacity figures for one opportunity.
    pub fn capacity(&self, opportunity_id: OpportunityId) -> ConsoleReply {
        match self.container.ledger.snapshot(&opportunity_id) {
            Ok(s) => ConsoleReply::ok(format!(
                "{}: cap {}, funded {}, remaining {}",
                opportunity_id, s.cap, s.current_funding, s.remaining
            )),
            Err(e) => ConsoleReply::rejected(e),
        }
    }
}

fn render_report(report: &AuditReport) -> String {
    let counts = &report.counts;
    let mut lines = vec![format!(
        "audit: {} matched, {} pending-mint, {} mismatched, {} no-contract",
        counts.matched, counts.pending_mint, counts.mismatched, counts.no_contract
    )];
    for record in report.mismatches() {
        let reason = record
            .reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        lines.push(format!(
            "MISMATCH {} wallet {}: {}",
            record.investment_id,
            to_hex(&record.wallet_address),
            reason
        ));
    }
    lines.join("\n")
}
