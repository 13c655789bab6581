//! Deferred execution transport seam.
//!
//! The engine hands a [`RunDispatch`] descriptor to the transport and forgets
//! about it; the transport guarantees the run entry point is invoked later,
//! possibly in another process. Delivery is at-least-once: the engine guards
//! against duplicates with the pending-claim check, and transport-level
//! retries stay disabled because the engine owns retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::EventPublisher;

/// Event name used by the event-driven transport implementation.
pub const DISPATCH_EVENT: &str = "task.dispatch";

/// Descriptor for one deferred invocation of the run entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDispatch {
    pub task_id: i64,
    /// Partition key so related tasks land on the same consumer.
    pub routing_key: Option<String>,
    /// Delay in seconds before processing (0 = immediate).
    pub delay_seconds: u32,
    /// Always true for engine dispatches: retry policy lives in the engine,
    /// never in the transport.
    pub transport_retries_disabled: bool,
}

impl RunDispatch {
    pub fn new(task_id: i64) -> Self {
        Self {
            task_id,
            routing_key: None,
            delay_seconds: 0,
            transport_retries_disabled: true,
        }
    }

    /// Partition key derived from a business reference, so every task touching
    /// the same entity routes consistently.
    pub fn routing_key_for(reference_id: i64, reference_type: &str) -> String {
        format!("{reference_id}{reference_type}")
    }

    pub fn with_routing_key(mut self, key: impl Into<String>) -> Self {
        self.routing_key = Some(key.into());
        self
    }

    pub fn with_delay(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    pub fn is_delayed(&self) -> bool {
        self.delay_seconds > 0
    }
}

/// Errors that can occur while scheduling a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport rejected the dispatch: {0}")]
    Rejected(String),
}

/// Fire-and-forget scheduling of a deferred run.
///
/// Implementations may bridge to an external queue, an event stream, or a
/// test double; the engine never consumes a return value beyond the error.
#[async_trait]
pub trait DeferredTransport: Send + Sync {
    async fn schedule(&self, dispatch: RunDispatch) -> Result<(), TransportError>;
}

/// Transport that publishes dispatch descriptors through the event publisher,
/// for worker loops subscribed to the broadcast stream.
#[derive(Debug, Clone)]
pub struct EventDrivenTransport {
    publisher: EventPublisher,
}

impl EventDrivenTransport {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl DeferredTransport for EventDrivenTransport {
    async fn schedule(&self, dispatch: RunDispatch) -> Result<(), TransportError> {
        debug!(
            task_id = dispatch.task_id,
            routing_key = ?dispatch.routing_key,
            delay_seconds = dispatch.delay_seconds,
            "scheduling deferred run"
        );
        let context = serde_json::to_value(&dispatch)?;
        self.publisher.publish(DISPATCH_EVENT, context);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_defaults() {
        let dispatch = RunDispatch::new(42);
        assert_eq!(dispatch.task_id, 42);
        assert!(dispatch.transport_retries_disabled);
        assert!(!dispatch.is_delayed());
        assert!(dispatch.routing_key.is_none());
    }

    #[test]
    fn test_routing_key_for_reference() {
        assert_eq!(RunDispatch::routing_key_for(17, "project"), "17project");
    }

    #[test]
    fn test_event_driven_transport_publishes_descriptor() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();
        let transport = EventDrivenTransport::new(publisher);

        let dispatch = RunDispatch::new(9).with_routing_key("9project").with_delay(30);
        tokio_test::block_on(transport.schedule(dispatch.clone())).unwrap();

        let event = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(event.name, DISPATCH_EVENT);
        let round_tripped: RunDispatch = serde_json::from_value(event.context).unwrap();
        assert_eq!(round_tripped, dispatch);
    }
}
