//! # Event Subscriber
//!
//! Receiving side of the bus. Both handles apply an [`EventFilter`] locally
//! and count events lost to lag, so an operator feed can say how much it
//! missed instead of silently skipping.

use crate::events::{EventFilter, PlatformEvent};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::warn;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Pull-style subscription.
pub struct Subscription {
    receiver: broadcast::Receiver<PlatformEvent>,
    filter: EventFilter,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<PlatformEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            missed: 0,
        }
    }

    /// Next matching event; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<PlatformEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => self.note_lag(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<PlatformEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(count)) => self.note_lag(count),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Events overwritten before this subscription read them.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Filter applied by this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    fn note_lag(&mut self, count: u64) {
        self.missed += count;
        warn!("[bus] Subscriber lagged, {} events lost", count);
    }
}

/// Push-style subscription as a `Stream`, used by the operator feed.
pub struct EventStream {
    inner: BroadcastStream<PlatformEvent>,
    filter: EventFilter,
    missed: u64,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<PlatformEvent>, filter: EventFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            missed: 0,
        }
    }

    /// Events overwritten before the stream yielded them.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

impl Stream for EventStream {
    type Item = PlatformEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        while let Poll::Ready(next) = Pin::new(&mut this.inner).poll_next(cx) {
            match next {
                Some(Ok(event)) if this.filter.matches(&event) => return Poll::Ready(Some(event)),
                Some(Ok(_)) => {}
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    this.missed += count;
                    warn!("[bus] Event stream lagged, {} events lost", count);
                }
                None => return Poll::Ready(None),
            }
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use shared_types::entities::{InvestmentId, OpportunityId};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn mismatch(opportunity_id: OpportunityId) -> PlatformEvent {
        PlatformEvent::ReconciliationMismatch {
            investment_id: InvestmentId::new(),
            opportunity_id,
            reason: "chain balance 0, expected 5".into(),
        }
    }

    fn cancelled() -> PlatformEvent {
        PlatformEvent::InvestmentCancelled {
            investment_id: InvestmentId::new(),
            opportunity_id: OpportunityId::new(),
            reason: "investor request".into(),
        }
    }

    #[tokio::test]
    async fn test_recv_skips_other_topics() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Audit]));

        bus.publish(cancelled()).await;
        bus.publish(mismatch(OpportunityId::new())).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.topic(), EventTopic::Audit);
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_subscription_per_opportunity() {
        let bus = InMemoryEventBus::new();
        let watched = OpportunityId::new();
        let mut sub = bus.subscribe(EventFilter::for_opportunities(vec![watched]));

        bus.publish(mismatch(OpportunityId::new())).await;
        bus.publish(mismatch(watched)).await;

        let received = sub.try_recv().unwrap().unwrap();
        assert_eq!(received.opportunity_id(), Some(watched));
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_lag_is_counted() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for _ in 0..5 {
            bus.publish(cancelled()).await;
        }

        assert!(sub.try_recv().unwrap().is_some());
        assert_eq!(sub.missed(), 3);
    }

    #[tokio::test]
    async fn test_closed_bus_reports_closed() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_event_stream_filters() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![EventTopic::Lifecycle]));

        bus.publish(mismatch(OpportunityId::new())).await;
        bus.publish(cancelled()).await;

        let received = timeout(Duration::from_millis(100), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, PlatformEvent::InvestmentCancelled { .. }));
        assert_eq!(stream.missed(), 0);
    }
}
