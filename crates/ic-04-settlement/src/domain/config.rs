//! # Settlement Configuration

use shared_types::Address;
use std::time::Duration;

/// Settlement reconciler configuration.
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    /// Gateway calls per job before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Ceiling for the doubled delay.
    pub max_backoff_ms: u64,
    /// Timeout around each gateway call.
    pub call_timeout_ms: u64,
    /// Mint attempts across all jobs after which the retry sweep stops
    /// re-queueing. Operators can still retry by hand.
    pub max_total_attempts: u32,
    /// Wallet that receives bonds transferred back after a refund.
    pub treasury_address: Address,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            call_timeout_ms: 10_000,
            max_total_attempts: 12,
            treasury_address: [0u8; 20],
        }
    }
}

impl SettlementConfig {
    /// Configuration for tests: short delays and timeouts.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            call_timeout_ms: 200,
            max_total_attempts: 6,
            treasury_address: [0xEE; 20],
        }
    }

    /// Timeout around one gateway call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Delay after failed attempt `attempt` (1-based), doubling and capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}
