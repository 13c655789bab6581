//! In-process event publisher backing the deferred transport and the push
//! gateway. Out-of-process workers subscribe to the broadcast stream and
//! react to dispatch and status events.

use serde_json::Value;
use tokio::sync::broadcast;

/// Fan-out publisher for engine side-effect events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context.
    ///
    /// Publishing with zero active subscribers is not an error: events are
    /// side effects, and nobody listening is an acceptable state.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();

        publisher.publish("task.dispatch", json!({ "task_id": 1 }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "task.dispatch");
        assert_eq!(event.context, json!({ "task_id": 1 }));
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let publisher = EventPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish("task.dispatch", json!({ "task_id": 1 }));
    }
}
