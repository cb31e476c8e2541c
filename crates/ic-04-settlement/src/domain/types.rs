//! # Chain Value Objects and Outcomes

use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash, InvestmentStatus, OpportunityId, Timestamp};
use std::fmt;

/// Smallest token units per bond (18 decimals).
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Raw token balance for a bond count.
pub fn token_balance_for(bonds: u64) -> u128 {
    u128::from(bonds).saturating_mul(TOKEN_UNIT)
}

/// Holder balance on one bond contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondBalance {
    /// Contract queried.
    pub contract_address: Address,
    /// Holder queried.
    pub holder: Address,
    /// Whole bonds held.
    pub bonds: u64,
    /// Raw token balance.
    pub token_balance: u128,
}

impl BondBalance {
    /// Balance of `bonds` whole bonds.
    pub fn new(contract_address: Address, holder: Address, bonds: u64) -> Self {
        Self {
            contract_address,
            holder,
            bonds,
            token_balance: token_balance_for(bonds),
        }
    }
}

/// Receipt of a mint or transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Balance of the affected holder after the transaction.
    pub balance: BondBalance,
}

/// Parameters of a bond contract deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployParams {
    /// Opportunity mirrored by the contract; deployments dedupe on it.
    pub opportunity_id: OpportunityId,
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Bonds the contract may ever mint.
    pub max_supply: u64,
    /// Coupon rate in basis points.
    pub coupon_rate_bps: u32,
    /// Maturity (ms).
    pub maturity_date: Timestamp,
}

/// Receipt of a deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    /// Deployed contract.
    pub contract_address: Address,
    /// Deployment transaction.
    pub tx_hash: Hash,
}

/// Why a settlement job did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The investment is no longer in the state the job needs.
    Status(InvestmentStatus),
    /// No wallet supplied; minting is skipped, never failed.
    NoWallet,
    /// The opportunity has no active contract yet.
    NoContract,
    /// A refund with nothing minted needs no transfer-back.
    NothingMinted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "investment is {}", status),
            Self::NoWallet => f.write_str("no wallet address"),
            Self::NoContract => f.write_str("no active contract"),
            Self::NothingMinted => f.write_str("nothing minted"),
        }
    }
}

/// Result of one settlement job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Bonds minted in this job.
    Minted {
        /// Mint transaction.
        tx_hash: Hash,
        /// Bonds this mint credited to the investment.
        on_chain_bonds: u64,
        /// Wallet's total holding on the contract after the mint.
        wallet_bonds: u64,
    },
    /// Bonds transferred back in this job.
    Compensated {
        /// Transfer transaction.
        tx_hash: Hash,
    },
    /// An earlier job already settled this key.
    AlreadySettled {
        /// Recorded transaction.
        tx_hash: Hash,
    },
    /// Another job holds the key right now.
    InFlight,
    /// Nothing to do.
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_balance_has_18_decimals() {
        assert_eq!(token_balance_for(0), 0);
        assert_eq!(token_balance_for(5), 5 * TOKEN_UNIT);
        assert_eq!(BondBalance::new([1; 20], [2; 20], 2).token_balance, 2 * TOKEN_UNIT);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::Status(InvestmentStatus::Refunded).to_string(),
            "investment is refunded"
        );
        assert_eq!(SkipReason::NoWallet.to_string(), "no wallet address");
    }
}
