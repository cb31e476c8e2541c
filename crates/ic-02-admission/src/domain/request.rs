//! # Admission Request and Re-check Types

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, InvestmentOpportunity, InvestorId, OpportunityId, PaymentMethod};

/// A new subscription as submitted by an investor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdmissionRequest {
    /// Target opportunity.
    pub opportunity_id: OpportunityId,
    /// Authenticated investor.
    pub investor_id: InvestorId,
    /// Units requested.
    pub bonds: u64,
    /// Opaque payment tag.
    pub payment_method: PaymentMethod,
    /// Wallet to mint to, if the investor supplied one.
    pub wallet_address: Option<Address>,
}

impl AdmissionRequest {
    /// Request without a wallet.
    pub fn new(
        opportunity_id: OpportunityId,
        investor_id: impl Into<String>,
        bonds: u64,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            opportunity_id,
            investor_id: InvestorId(investor_id.into()),
            bonds,
            payment_method: PaymentMethod(payment_method.into()),
            wallet_address: None,
        }
    }

    /// Sets the mint destination (builder style).
    pub fn with_wallet(mut self, wallet_address: Address) -> Self {
        self.wallet_address = Some(wallet_address);
        self
    }
}

/// How strictly confirmation re-checks the snapshotted amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecheckOptions {
    /// Allowed absolute difference between snapshot and today's price.
    pub amount_drift_tolerance: Amount,
    /// Operator override: confirm at the snapshotted amount regardless.
    pub accept_amount_drift: bool,
}

/// Outcome of a successful confirmation re-check.
#[derive(Clone, Debug)]
pub struct ConfirmationCheck {
    /// The opportunity as re-read for the check.
    pub opportunity: InvestmentOpportunity,
    /// `bonds × price` at today's price.
    pub recomputed_amount: Amount,
}
