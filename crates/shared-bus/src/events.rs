//! # Platform Events
//!
//! Defines all event types that flow through the shared bus. Events are
//! notifications for operator feeds and audit trails; the settlement
//! pipeline itself is driven through `SettlementScheduler`, never by
//! best-effort broadcast.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Amount, Hash, InvestmentId, OpportunityId};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformEvent {
    // =========================================================================
    // SUBSYSTEM 2: ADMISSION
    // =========================================================================
    /// A new investment passed soft admission and is pending.
    InvestmentAdmitted {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        bonds: u64,
        amount: Amount,
    },

    // =========================================================================
    // SUBSYSTEM 3: LIFECYCLE
    // =========================================================================
    /// Capacity was reserved and the investment confirmed.
    InvestmentConfirmed {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        amount: Amount,
        current_funding: Amount,
        cap: Amount,
    },

    /// Confirmation was rejected; the investment stays pending.
    ConfirmationRejected {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        reason: String,
    },

    /// A pending investment was withdrawn.
    InvestmentCancelled {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        reason: String,
    },

    /// A pending investment failed payment or validation.
    InvestmentFailed {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        reason: String,
    },

    /// A confirmed investment was refunded and its capacity released.
    InvestmentRefunded {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        released: Amount,
        current_funding: Amount,
    },

    // =========================================================================
    // SUBSYSTEM 4: SETTLEMENT
    // =========================================================================
    /// Bonds were minted on the chain.
    MintRecorded {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        tx_hash: Hash,
        bonds: u64,
    },

    /// A mint attempt failed; the confirmation stands.
    MintFailed {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        attempt: u32,
        error: String,
    },

    /// Minted bonds were transferred back after a refund.
    CompensationRecorded {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        tx_hash: Hash,
    },

    // =========================================================================
    // SUBSYSTEM 5: CONSISTENCY AUDIT
    // =========================================================================
    /// Ledger and chain disagree; operator action required.
    ReconciliationMismatch {
        investment_id: InvestmentId,
        opportunity_id: OpportunityId,
        reason: String,
    },

    /// An audit sweep finished.
    AuditCompleted {
        opportunity_id: Option<OpportunityId>,
        matched: usize,
        pending_mint: usize,
        mismatched: usize,
        no_contract: usize,
    },
}

impl PlatformEvent {
    /// Get the topic for this event (used for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::InvestmentAdmitted { .. } => EventTopic::Admission,
            Self::InvestmentConfirmed { .. }
            | Self::ConfirmationRejected { .. }
            | Self::InvestmentCancelled { .. }
            | Self::InvestmentFailed { .. }
            | Self::InvestmentRefunded { .. } => EventTopic::Lifecycle,
            Self::MintRecorded { .. }
            | Self::MintFailed { .. }
            | Self::CompensationRecorded { .. } => EventTopic::Settlement,
            Self::ReconciliationMismatch { .. } | Self::AuditCompleted { .. } => {
                EventTopic::Audit
            }
        }
    }

    /// Get the source subsystem ID for this event.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self.topic() {
            EventTopic::Admission => 2,
            EventTopic::Lifecycle => 3,
            EventTopic::Settlement => 4,
            EventTopic::Audit => 5,
            EventTopic::All => 0,
        }
    }

    /// Opportunity the event concerns, if any.
    #[must_use]
    pub fn opportunity_id(&self) -> Option<OpportunityId> {
        match self {
            Self::InvestmentAdmitted { opportunity_id, .. }
            | Self::InvestmentConfirmed { opportunity_id, .. }
            | Self::ConfirmationRejected { opportunity_id, .. }
            | Self::InvestmentCancelled { opportunity_id, .. }
            | Self::InvestmentFailed { opportunity_id, .. }
            | Self::InvestmentRefunded { opportunity_id, .. }
            | Self::MintRecorded { opportunity_id, .. }
            | Self::MintFailed { opportunity_id, .. }
            | Self::CompensationRecorded { opportunity_id, .. }
            | Self::ReconciliationMismatch { opportunity_id, .. } => Some(*opportunity_id),
            Self::AuditCompleted { opportunity_id, .. } => *opportunity_id,
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 2 events.
    Admission,
    /// Subsystem 3 events.
    Lifecycle,
    /// Subsystem 4 events.
    Settlement,
    /// Subsystem 5 events.
    Audit,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Opportunities to include. Empty means all opportunities.
    pub opportunities: Vec<OpportunityId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            opportunities: Vec::new(),
        }
    }

    /// Create a filter for events about specific opportunities.
    #[must_use]
    pub fn for_opportunities(opportunities: Vec<OpportunityId>) -> Self {
        Self {
            topics: Vec::new(),
            opportunities,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &PlatformEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let opportunity_match = self.opportunities.is_empty()
            || event
                .opportunity_id()
                .is_some_and(|id| self.opportunities.contains(&id));

        topic_match && opportunity_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed(opportunity_id: OpportunityId) -> PlatformEvent {
        PlatformEvent::InvestmentConfirmed {
            investment_id: InvestmentId::new(),
            opportunity_id,
            amount: 100,
            current_funding: 9_900,
            cap: 10_000,
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        let event = confirmed(OpportunityId::new());
        assert_eq!(event.topic(), EventTopic::Lifecycle);
        assert_eq!(event.source_subsystem(), 3);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&confirmed(OpportunityId::new())));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Settlement]);
        assert!(!filter.matches(&confirmed(OpportunityId::new())));

        let mint = PlatformEvent::MintFailed {
            investment_id: InvestmentId::new(),
            opportunity_id: OpportunityId::new(),
            attempt: 1,
            error: "timeout".into(),
        };
        assert!(filter.matches(&mint));
    }

    #[test]
    fn test_filter_by_opportunity() {
        let watched = OpportunityId::new();
        let filter = EventFilter::for_opportunities(vec![watched]);
        assert!(filter.matches(&confirmed(watched)));
        assert!(!filter.matches(&confirmed(OpportunityId::new())));

        // Sweeps over every opportunity carry no id
        let sweep = PlatformEvent::AuditCompleted {
            opportunity_id: None,
            matched: 0,
            pending_mint: 0,
            mismatched: 0,
            no_contract: 0,
        };
        assert!(!filter.matches(&sweep));
    }
}
