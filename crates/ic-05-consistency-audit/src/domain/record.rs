//! # Reconciliation Records
//!
//! Chain balances are per address, so every investment is judged against
//! the position of its wallet on the opportunity's contract:
//!
//! | Figure | Meaning |
//! |--------|---------|
//! | `expected_bonds` | bonds over all of the wallet's confirmed investments |
//! | `minted_bonds` | bonds over those with a recorded mint |
//! | `observed_bonds` | fresh `balance_of` result |
//!
//! A wallet with one investment reduces to "balance equals `bonds`".

use crate::domain::AuditConfig;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Investment, InvestmentId, OpportunityId, Timestamp};
use std::fmt;

/// Audit verdict for one investment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Ledger and chain agree.
    Matched,
    /// Mint not recorded yet, no error, still within the grace window.
    PendingMint,
    /// Ledger and chain disagree; operator action required.
    Mismatched,
    /// The opportunity has no deployed contract.
    NoContract,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Matched => "matched",
            Self::PendingMint => "pending-mint",
            Self::Mismatched => "mismatched",
            Self::NoContract => "no-contract",
        };
        f.write_str(label)
    }
}

/// Cause of a `mismatched` verdict, rendered verbatim to operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchReason {
    /// The settlement mirror carries a chain error.
    BlockchainError(String),
    /// The wallet holds a different number of bonds.
    BalanceDiffers {
        /// Bonds on chain.
        observed: u64,
        /// Bonds the ledger implies.
        expected: u64,
    },
    /// No mint recorded and the grace window has passed.
    MintOverdue {
        /// Time since confirmation.
        waited_ms: u64,
    },
    /// The balance query itself failed.
    BalanceUnavailable(String),
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockchainError(error) => write!(f, "blockchain error: {}", error),
            Self::BalanceDiffers { observed, expected } => {
                write!(f, "chain balance {}, expected {}", observed, expected)
            }
            Self::MintOverdue { waited_ms } => {
                write!(f, "mint not recorded {}ms after confirmation", waited_ms)
            }
            Self::BalanceUnavailable(error) => write!(f, "balance query failed: {}", error),
        }
    }
}

/// A wallet's position on one opportunity's contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletPosition {
    /// Wallet queried.
    pub wallet: Address,
    /// Σ bonds over the wallet's confirmed investments.
    pub expected_bonds: u64,
    /// Σ bonds over those with a recorded mint.
    pub minted_bonds: u64,
    /// Fresh balance, or the query error.
    pub observed: Result<u64, String>,
}

impl WalletPosition {
    /// Position of `wallet` over `investments` (all confirmed, same wallet).
    pub fn of(wallet: Address, investments: &[Investment], observed: Result<u64, String>) -> Self {
        let sum = |minted_only: bool| {
            investments
                .iter()
                .filter(|i| !minted_only || i.is_minted())
                .fold(0u64, |acc, i| acc.saturating_add(i.bonds))
        };
        Self {
            wallet,
            expected_bonds: sum(false),
            minted_bonds: sum(true),
            observed,
        }
    }
}

/// One investment paired with its opportunity's on-chain state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReconciliationRecord {
    /// Investment audited.
    pub investment_id: InvestmentId,
    /// Its opportunity.
    pub opportunity_id: OpportunityId,
    /// Wallet the bonds belong to.
    pub wallet_address: Address,
    /// Bonds the ledger implies for the wallet.
    pub expected_bonds: u64,
    /// Bonds on chain, when the query ran and succeeded.
    pub observed_bonds: Option<u64>,
    /// Verdict.
    pub classification: Classification,
    /// Cause when mismatched.
    pub reason: Option<MismatchReason>,
}

impl ChainReconciliationRecord {
    /// Record for an opportunity with no deployed contract.
    pub fn no_contract(investment: &Investment, wallet: Address) -> Self {
        Self {
            investment_id: investment.id,
            opportunity_id: investment.opportunity_id,
            wallet_address: wallet,
            expected_bonds: investment.bonds,
            observed_bonds: None,
            classification: Classification::NoContract,
            reason: None,
        }
    }

    /// Classify one confirmed investment against its wallet position.
    pub fn classify(
        investment: &Investment,
        position: &WalletPosition,
        now: Timestamp,
        config: &AuditConfig,
    ) -> Self {
        let (classification, reason) = Self::verdict(investment, position, now, config);
        Self {
            investment_id: investment.id,
            opportunity_id: investment.opportunity_id,
            wallet_address: position.wallet,
            expected_bonds: position.expected_bonds,
            observed_bonds: position.observed.as_ref().ok().copied(),
            classification,
            reason,
        }
    }

    fn verdict(
        investment: &Investment,
        position: &WalletPosition,
        now: Timestamp,
        config: &AuditConfig,
    ) -> (Classification, Option<MismatchReason>) {
        if let Some(error) = &investment.settlement.blockchain_error {
            return (
                Classification::Mismatched,
                Some(MismatchReason::BlockchainError(error.clone())),
            );
        }
        let observed = match &position.observed {
            Ok(observed) => *observed,
            Err(error) => {
                return (
                    Classification::Mismatched,
                    Some(MismatchReason::BalanceUnavailable(error.clone())),
                )
            }
        };

        if observed == position.expected_bonds {
            return (Classification::Matched, None);
        }

        if investment.is_minted() {
            // Siblings still waiting for their mint leave the balance short
            if observed == position.minted_bonds {
                return (Classification::Matched, None);
            }
            return (
                Classification::Mismatched,
                Some(MismatchReason::BalanceDiffers {
                    observed,
                    expected: position.minted_bonds,
                }),
            );
        }

        // Unminted: the balance must not yet include this investment
        if observed != position.minted_bonds {
            return (
                Classification::Mismatched,
                Some(MismatchReason::BalanceDiffers {
                    observed,
                    expected: position.expected_bonds,
                }),
            );
        }
        let since = investment.confirmed_at.unwrap_or(investment.updated_at);
        let waited_ms = now.saturating_sub(since);
        if waited_ms <= config.pending_mint_grace_ms {
            (Classification::PendingMint, None)
        } else {
            (
                Classification::Mismatched,
                Some(MismatchReason::MintOverdue { waited_ms }),
            )
        }
    }

    /// True when operator action is required.
    pub fn is_mismatch(&self) -> bool {
        self.classification == Classification::Mismatched
    }
}

/// Tally of classifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCounts {
    /// `matched` records.
    pub matched: usize,
    /// `pending-mint` records.
    pub pending_mint: usize,
    /// `mismatched` records.
    pub mismatched: usize,
    /// `no-contract` records.
    pub no_contract: usize,
}

impl AuditCounts {
    /// Count one record.
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Matched => self.matched += 1,
            Classification::PendingMint => self.pending_mint += 1,
            Classification::Mismatched => self.mismatched += 1,
            Classification::NoContract => self.no_contract += 1,
        }
    }

    /// Records counted.
    pub fn total(&self) -> usize {
        self.matched + self.pending_mint + self.mismatched + self.no_contract
    }
}

/// Result of one audit sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Opportunity audited, or `None` for all.
    pub opportunity_id: Option<OpportunityId>,
    /// One record per confirmed investment with a wallet.
    pub records: Vec<ChainReconciliationRecord>,
    /// Tally of `records`.
    pub counts: AuditCounts,
    /// When the sweep finished (ms).
    pub generated_at: Timestamp,
}

impl AuditReport {
    /// Records that need operator action.
    pub fn mismatches(&self) -> impl Iterator<Item = &ChainReconciliationRecord> {
        self.records.iter().filter(|r| r.is_mismatch())
    }

    /// Record for one investment.
    pub fn record_for(&self, id: &InvestmentId) -> Option<&ChainReconciliationRecord> {
        self.records.iter().find(|r| &r.investment_id == id)
    }
}
