//! Event publishers for the adapter layer

use crate::error::{LadderError, Result};
use crate::events::messages::{EventEnvelope, LadderEvent};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Trait for publishing ladder events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: LadderEvent) -> Result<()>;
}

/// Default capacity of the broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out publisher; every adapter holds its own receiver
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: LadderEvent) -> Result<()> {
        let envelope = EventEnvelope::new(event);
        debug!(
            "Publishing {} on {}",
            envelope.event.event_type(),
            envelope.topic
        );
        // No subscribers is not an error; events are fire-and-forget
        let _ = self.sender.send(envelope);
        Ok(())
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<LadderEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (for testing)
    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<LadderEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Get published event type names in order (for testing)
    pub fn get_event_types(&self) -> Vec<&'static str> {
        self.get_published_events()
            .iter()
            .map(LadderEvent::event_type)
            .collect()
    }

    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_event_types()
            .into_iter()
            .filter(|t| *t == event_type)
            .count()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: LadderEvent) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LadderError::Internal {
                message: format!("simulated publish failure for {}", event.event_type()),
            });
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
