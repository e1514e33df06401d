//! # Event Publisher
//!
//! The write side of the bus. Publishing never blocks and never fails: the
//! ledger must not stall because nobody is listening or a reader is slow.

use crate::events::{EventFilter, LedgerEvent};
use crate::subscriber::{EventSubscriber, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns how many subscriptions it reached.
    async fn publish(&self, event: LedgerEvent) -> usize;
}

/// Process-local bus over a `tokio::sync::broadcast` channel.
///
/// Each subscription holds its own cursor into a ring of `capacity` events;
/// one that falls further behind skips ahead and counts what it missed.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, alerts_only = filter.alerts_only, "[bus] New subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: LedgerEvent) -> usize {
        let topic = event.topic();
        // `send` only fails when there are no receivers.
        let reached = self.sender.send(event).unwrap_or(0);
        trace!(?topic, reached, "[bus] Event published");
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;

    fn committed(sequence: u64) -> LedgerEvent {
        LedgerEvent::BlockCommitted {
            sequence,
            block_hash: [0; 32],
            record_count: 1,
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(committed(0)).await, 0);
    }

    #[tokio::test]
    async fn test_every_subscription_sees_the_event() {
        let bus = InMemoryEventBus::new();
        let mut commits = bus.subscribe(EventFilter::topics(vec![EventTopic::Commits]));
        let mut everything = bus.subscribe(EventFilter::all());

        assert_eq!(bus.publish(committed(7)).await, 2);

        for sub in [&mut commits, &mut everything] {
            match sub.recv().await {
                Some(LedgerEvent::BlockCommitted { sequence, .. }) => assert_eq!(sequence, 7),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
