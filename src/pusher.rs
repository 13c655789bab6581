//! Push gateway seam.
//!
//! Unit-of-work lifecycle hooks trigger status-changed events through this
//! gateway so connected clients can observe task progress. Triggering is a
//! downstream side effect of a state transition, never part of the state
//! machine itself.

use async_trait::async_trait;
use serde_json::Value;

use crate::events::EventPublisher;

/// Event fired when an async task changes status.
pub const ASYNC_TASK_STATUS_CHANGED: &str = "async-task-status-changed";

/// Presence channel carrying project-scoped events, namespaced per
/// environment so deployments sharing one push project stay isolated.
pub fn projects_channel(namespace: &str) -> String {
    format!("presence-projects-{namespace}")
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push gateway rejected the event: {0}")]
    Rejected(String),
}

/// A pub/sub notification channel with a single trigger operation.
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn trigger(&self, channel: &str, event: &str, payload: Value) -> Result<(), PushError>;
}

/// Pusher that forwards triggers through the in-process event publisher as
/// `{channel}.{event}` events.
#[derive(Debug, Clone)]
pub struct EventBackedPusher {
    publisher: EventPublisher,
}

impl EventBackedPusher {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Pusher for EventBackedPusher {
    async fn trigger(&self, channel: &str, event: &str, payload: Value) -> Result<(), PushError> {
        self.publisher.publish(format!("{channel}.{event}"), payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projects_channel_name() {
        assert_eq!(projects_channel("staging"), "presence-projects-staging");
    }

    #[tokio::test]
    async fn test_trigger_publishes_namespaced_event() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();
        let pusher = EventBackedPusher::new(publisher);

        pusher
            .trigger(
                &projects_channel("default"),
                ASYNC_TASK_STATUS_CHANGED,
                json!({ "id": 1, "status": "running" }),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.name,
            "presence-projects-default.async-task-status-changed"
        );
        assert_eq!(event.context["status"], "running");
    }
}
