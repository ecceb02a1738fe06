//! Event bus seam and the default implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::types::LifecycleEvent;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Sink for lifecycle events.
///
/// `publish` is synchronous and must not block: it is called from signal
/// handlers running on the connection's supervisor task.
pub trait EventBus: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: LifecycleEvent);
}

// ─────────────────────────────────────────────────────────────────────────────
// Broadcast
// ─────────────────────────────────────────────────────────────────────────────

/// Broadcast-based event bus.
///
/// Slow receivers are dropped (lagged) rather than blocking the publisher.
pub struct BroadcastEventBus {
    tx: broadcast::Sender<LifecycleEvent>,
    publish_count: AtomicU64,
}

impl BroadcastEventBus {
    /// Create a new bus with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            publish_count: AtomicU64::new(0),
        }
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events published.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: LifecycleEvent) {
        let _ = self.publish_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(event = event.event_type(), "lifecycle event");
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording
// ─────────────────────────────────────────────────────────────────────────────

/// Bus that keeps every published event in memory.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventBus {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events published so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Number of published events of the given type.
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: LifecycleEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed() -> LifecycleEvent {
        LifecycleEvent::Closed { error: None }
    }

    #[test]
    fn publish_with_no_subscribers() {
        let bus = BroadcastEventBus::new();
        bus.publish(closed());
        assert_eq!(bus.publish_count(), 1);
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = BroadcastEventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(LifecycleEvent::Reconnecting {
            error: Some("connection reset".into()),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "reconnecting");
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = BroadcastEventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(closed());
        assert_eq!(rx1.recv().await.unwrap(), closed());
        assert_eq!(rx2.recv().await.unwrap(), closed());
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let bus = BroadcastEventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        bus.publish(closed());
        bus.publish(closed());
        bus.publish(closed());

        assert!(rx.recv().await.is_err());
    }

    #[test]
    fn bus_is_object_safe() {
        let bus: std::sync::Arc<dyn EventBus> = std::sync::Arc::new(RecordingEventBus::new());
        bus.publish(closed());
    }

    #[test]
    fn recorder_keeps_order() {
        let bus = RecordingEventBus::new();
        bus.publish(LifecycleEvent::Reconnecting { error: None });
        bus.publish(LifecycleEvent::Reconnected {
            connection_id: Some("c2".into()),
        });

        let events = bus.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "reconnecting");
        assert_eq!(bus.count("reconnected"), 1);
        assert_eq!(bus.count("closed"), 0);
    }
}
