//! # Core Domain Entities
//!
//! Defines the entities shared by every subsystem of the investment core.
//!
//! ## Clusters
//!
//! - **Identity**: `OpportunityId`, `InvestmentId`, `InvestorId`, `PaymentMethod`
//! - **Offering**: `InvestmentOpportunity`, `OpportunityStatus`, `ContractBinding`
//! - **Subscription**: `Investment`, `InvestmentStatus`, `SettlementRecord`

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// Money in minor currency units. Never a float.
pub type Amount = u128;

/// A 20-byte chain address (investor wallets, contracts, treasury).
pub type Address = [u8; 20];

/// A 32-byte transaction hash as reported by the chain.
pub type Hash = [u8; 32];

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// Renders an address or hash as `0x`-prefixed hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a `0x`-prefixed (or bare) hex string into a 20-byte address.
pub fn parse_address(value: &str) -> Option<Address> {
    let raw = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(raw).ok()?;
    bytes.try_into().ok()
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Opaque identifier of an investment opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpportunityId(pub Uuid);

impl OpportunityId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OpportunityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opp-{}", self.0)
    }
}

/// Opaque identifier of a single investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvestmentId(pub Uuid);

impl InvestmentId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvestmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvestmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inv-{}", self.0)
    }
}

/// Investor identity as supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvestorId(pub String);

impl fmt::Display for InvestorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment-method tag from the payment collaborator. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethod(pub String);

// =============================================================================
// OFFERING
// =============================================================================

/// Opportunity lifecycle status.
///
/// Only `Active` admits new investments or confirmations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityStatus {
    /// Announced, not yet open.
    #[default]
    Upcoming,
    /// Open for subscriptions.
    Active,
    /// Temporarily suspended by an operator.
    Paused,
    /// Soft-closed. Opportunities are never deleted.
    Closed,
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Deployed bond contract mirroring an opportunity on the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBinding {
    /// Contract address.
    pub contract_address: Address,
    /// Deployment transaction hash.
    pub deploy_tx_hash: Hash,
    /// When the contract was deployed (ms).
    pub deployed_at: Timestamp,
    /// Whether the contract accepts mints.
    pub is_active: bool,
}

/// A capacity-limited financial offering.
///
/// INVARIANT: `current_funding` equals the sum of `amount` over confirmed
/// investments referencing this opportunity and never exceeds [`cap`].
///
/// [`cap`]: InvestmentOpportunity::cap
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvestmentOpportunity {
    /// Unique identifier.
    pub id: OpportunityId,
    /// Display name, also used as the token name on deployment.
    pub name: String,
    /// Token symbol used on deployment.
    pub symbol: String,
    /// Funding target (> 0).
    pub total_funding_target: Amount,
    /// Funding confirmed so far. Mutated only by the capacity ledger.
    pub current_funding: Amount,
    /// Price of one bond (> 0).
    pub min_investment: Amount,
    /// Optional aggregate ceiling below the target.
    pub max_investment: Option<Amount>,
    /// Coupon rate in basis points.
    pub coupon_rate_bps: u32,
    /// Bond maturity (ms).
    pub maturity_date: Timestamp,
    /// Lifecycle status.
    pub status: OpportunityStatus,
    /// Subscriptions are refused after this instant, if set.
    pub closes_at: Option<Timestamp>,
    /// Chain binding, if a contract was deployed.
    pub contract: Option<ContractBinding>,
}

impl InvestmentOpportunity {
    /// Creates an upcoming opportunity with no funding.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        total_funding_target: Amount,
        min_investment: Amount,
    ) -> Self {
        Self {
            id: OpportunityId::new(),
            name: name.into(),
            symbol: symbol.into(),
            total_funding_target,
            current_funding: 0,
            min_investment,
            max_investment: None,
            coupon_rate_bps: 0,
            maturity_date: 0,
            status: OpportunityStatus::Upcoming,
            closes_at: None,
            contract: None,
        }
    }

    /// Sets the status (builder style).
    pub fn with_status(mut self, status: OpportunityStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the aggregate ceiling (builder style).
    pub fn with_max_investment(mut self, max_investment: Amount) -> Self {
        self.max_investment = Some(max_investment);
        self
    }

    /// Sets the already-confirmed funding (builder style, seeding only).
    pub fn with_current_funding(mut self, current_funding: Amount) -> Self {
        self.current_funding = current_funding;
        self
    }

    /// Effective funding cap.
    ///
    /// `max_investment` tightens the target when set; the target always bounds.
    pub fn cap(&self) -> Amount {
        match self.max_investment {
            Some(max) => max.min(self.total_funding_target),
            None => self.total_funding_target,
        }
    }

    /// Remaining capacity, saturating at zero.
    pub fn remaining(&self) -> Amount {
        self.cap().saturating_sub(self.current_funding)
    }

    /// First data-model invariant the record breaks, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        if self.total_funding_target == 0 {
            Some("total funding target must be positive")
        } else if self.min_investment == 0 {
            Some("minimum investment must be positive")
        } else if self.current_funding > self.cap() {
            Some("current funding exceeds cap")
        } else {
            None
        }
    }

    /// Returns true if the offering is past its closing time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.closes_at.is_some_and(|closes_at| now >= closes_at)
    }

    /// Returns true if the opportunity admits and confirms investments.
    pub fn accepts_investments(&self, now: Timestamp) -> bool {
        self.status == OpportunityStatus::Active && !self.is_expired(now)
    }

    /// Returns the contract binding only when it is deployed and active.
    pub fn active_contract(&self) -> Option<&ContractBinding> {
        self.contract.as_ref().filter(|c| c.is_active)
    }

    /// Price for `bonds` units, `None` on overflow.
    pub fn price_for(&self, bonds: u64) -> Option<Amount> {
        self.min_investment.checked_mul(Amount::from(bonds))
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Investment lifecycle status.
///
/// Transition table:
/// ```text
/// [PENDING] ──confirm──→ [CONFIRMED] ──refund──→ [REFUNDED]
///     │
///     ├──cancel──→ [CANCELLED]
///     └──fail────→ [FAILED]
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestmentStatus {
    /// Admitted, no capacity held.
    #[default]
    Pending,
    /// Capacity reserved; the only state that holds capacity.
    Confirmed,
    /// Payment or validation failure before confirmation.
    Failed,
    /// Withdrawn before confirmation.
    Cancelled,
    /// Confirmation reversed, capacity released.
    Refunded,
}

impl InvestmentStatus {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: InvestmentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::Failed)
                | (Self::Confirmed, Self::Refunded)
        )
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }

    /// Returns true if an investment in this state holds ledger capacity.
    pub fn holds_capacity(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

/// Chain-side mirror of a confirmed investment.
///
/// Written only by the settlement reconciler. Never authoritative for capacity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Destination wallet; minting is skipped without one.
    pub wallet_address: Option<Address>,
    /// Hash of the successful mint.
    pub mint_tx_hash: Option<Hash>,
    /// Bonds this investment holds on chain: `bonds` once minted, zero after
    /// the transfer-back. Never the wallet total, which other investments
    /// may share.
    pub on_chain_bonds: Option<u64>,
    /// Raw token amount matching `on_chain_bonds`.
    pub on_chain_token_balance: Option<u128>,
    /// Last chain failure, cleared on success.
    pub blockchain_error: Option<String>,
    /// Mint attempts across all retries.
    pub mint_attempts: u32,
    /// Hash of the transfer-back after a refund.
    pub compensation_tx_hash: Option<Hash>,
    /// Last time the reconciler touched this record (ms).
    pub last_settlement_at: Option<Timestamp>,
}

/// An investor's subscription to one opportunity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Investment {
    /// Unique identifier.
    pub id: InvestmentId,
    /// Owning opportunity.
    pub opportunity_id: OpportunityId,
    /// Subscribing investor.
    pub investor_id: InvestorId,
    /// Opaque payment tag.
    pub payment_method: PaymentMethod,
    /// Units subscribed (>= 1).
    pub bonds: u64,
    /// `bonds × price` snapshotted at submission. Immutable.
    pub amount: Amount,
    /// Lifecycle status.
    pub status: InvestmentStatus,
    /// Submission time (ms).
    pub created_at: Timestamp,
    /// Confirmation time (ms).
    pub confirmed_at: Option<Timestamp>,
    /// Last status change (ms).
    pub updated_at: Timestamp,
    /// Cause recorded on fail/cancel.
    pub failure_reason: Option<String>,
    /// Chain mirror.
    pub settlement: SettlementRecord,
}

impl Investment {
    /// Returns true if the investment holds ledger capacity.
    pub fn holds_capacity(&self) -> bool {
        self.status.holds_capacity()
    }

    /// Returns true once a mint has been recorded.
    pub fn is_minted(&self) -> bool {
        self.settlement.mint_tx_hash.is_some()
    }

    /// Moves to `next` if the transition table allows it.
    ///
    /// # Errors
    /// Returns `(from, to)` when the edge is not in the table.
    pub fn transition_to(
        &mut self,
        next: InvestmentStatus,
        now: Timestamp,
    ) -> Result<(), (InvestmentStatus, InvestmentStatus)> {
        if !self.status.can_transition_to(next) {
            return Err((self.status, next));
        }
        self.status = next;
        self.updated_at = now;
        if next == InvestmentStatus::Confirmed {
            self.confirmed_at = Some(now);
        }
        Ok(())
    }
}
