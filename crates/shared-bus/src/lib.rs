//! # Shared Bus - Event Bus for Operator Feeds
//!
//! Broadcasts lifecycle, settlement and audit notifications to whoever is
//! listening: the operator feed, dashboards, tests.
//!
//! ## Delivery Rules
//!
//! - Events are published **after** the state change they describe is durable
//!   and after every ledger lock is released.
//! - Delivery is best effort. Nothing that must happen (minting, compensation)
//!   is driven from this bus; that goes through `SettlementScheduler`.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Lifecycle   │                    │ Operator     │
//! │  Settlement  │    publish()       │ feed         │
//! │  Auditor     │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, PlatformEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
