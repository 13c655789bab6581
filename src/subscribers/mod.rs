//! Subscriber registry and notification fan-out.
//!
//! A subscriber is a capability with a single `notify` operation, resolved by
//! name from a fixed registry and invoked once a task reaches a final,
//! no-more-retries outcome. Resolution of an unregistered name is a fatal
//! engine error; a delivery failure in one subscriber is isolated so the
//! remaining subscribers still run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::EngineError;
use crate::models::task::TaskRecord;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("subscriber delivery failed: {0}")]
    Delivery(String),
}

/// A notification sink for final task outcomes.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn notify(&self, task: &TaskRecord) -> Result<(), NotifyError>;
}

/// Fixed name-to-subscriber registry, assembled at startup.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<String, Arc<dyn Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.insert(name.into(), subscriber);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subscribers.contains_key(name)
    }

    /// Resolve the named subscribers, preserving order.
    pub fn build(&self, names: &[String]) -> Result<Vec<Arc<dyn Subscriber>>, EngineError> {
        names
            .iter()
            .map(|name| {
                self.subscribers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownSubscriber { name: name.clone() })
            })
            .collect()
    }
}

/// Deliver the final task record to each subscriber in metadata order.
///
/// Failures are logged and swallowed so one misbehaving sink cannot starve
/// the rest of the fan-out.
pub async fn send_notifications(subscribers: &[Arc<dyn Subscriber>], task: &TaskRecord) {
    for subscriber in subscribers {
        if let Err(e) = subscriber.notify(task).await {
            warn!(task_id = task.id, error = %e, "subscriber notification failed");
        }
    }
}
