//! # Audit Configuration

/// Consistency auditor configuration.
#[derive(Clone, Debug)]
pub struct AuditConfig {
    /// How long after confirmation an unminted investment counts as
    /// `pending-mint` rather than `mismatched`.
    pub pending_mint_grace_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            pending_mint_grace_ms: 5 * 60 * 1_000,
        }
    }
}

impl AuditConfig {
    /// Configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            pending_mint_grace_ms: 1_000,
        }
    }
}
