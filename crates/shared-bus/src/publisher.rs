//! # Event Publisher
//!
//! Sending side of the bus. Subsystems hold `Arc<dyn EventPublisher>` and the
//! runtime wires an [`InMemoryEventBus`].

use crate::events::{EventFilter, PlatformEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::trace;

/// Publishes platform events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event. Returns how many receivers it reached.
    async fn publish(&self, event: PlatformEvent) -> usize;

    /// Total events published.
    fn events_published(&self) -> u64;
}

/// Broadcast-backed bus.
///
/// Every subscriber sees every event and filters locally. A subscriber that
/// falls `capacity` events behind loses the oldest ones.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<PlatformEvent>,
    capacity: usize,
    published: AtomicU64,
    undelivered: AtomicU64,
}

impl InMemoryEventBus {
    /// Bus with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
        }
    }

    /// Pull-style subscription.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Stream-style subscription.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    /// Live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events published while nobody was listening.
    #[must_use]
    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: PlatformEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();
        let opportunity = event.opportunity_id();

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(
                    "[bus] {:?} event for {:?} reached {} receivers",
                    topic,
                    opportunity,
                    receivers
                );
                receivers
            }
            Err(_) => {
                self.undelivered.fetch_add(1, Ordering::Relaxed);
                trace!("[bus] {:?} event for {:?} had no receivers", topic, opportunity);
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
