//! # Unit-of-Work Layer
//!
//! A unit of work is the pluggable business logic a task executes. Concrete
//! kinds implement [`TaskWork`]: `execute` is the only required method and
//! must never set status itself — it returns a value or raises a
//! [`WorkError`], and the engine owns every transition. The lifecycle hooks
//! default to no-ops; kinds override them to emit external side effects such
//! as status-changed push events.

pub mod project;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::result::ExceptionInfo;
use crate::models::task::TaskRecord;

pub use registry::{WorkKey, WorkRegistry};

/// Business failure raised by a unit of work.
///
/// These are absorbed by the run loop and converted into a failed or
/// timed-out record subject to retry policy; they never propagate past
/// `run_task`.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("{message}")]
    Failed {
        message: String,
        detail: Option<Value>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("downstream service took too long to respond")]
    TimedOut,
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            detail: None,
            source: None,
        }
    }

    pub fn failed_with_detail(message: impl Into<String>, detail: Value) -> Self {
        Self::Failed {
            message: message.into(),
            detail: Some(detail),
            source: None,
        }
    }

    pub fn caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            detail: None,
            source: Some(Box::new(source)),
        }
    }
}

/// The pluggable business logic behind one task kind.
#[async_trait]
pub trait TaskWork: Send + Sync {
    /// Run the business logic. Arguments come from the record's metadata;
    /// the returned value is surfaced through the success notification but
    /// never persisted.
    async fn execute(&mut self, task: &TaskRecord) -> Result<Option<Value>, WorkError>;

    /// Invoked after the record has been claimed for running.
    async fn on_running(&self, _task: &TaskRecord) {}

    /// Invoked after the success transition has been applied.
    async fn on_success(&self, _task: &TaskRecord, _return_value: Option<&Value>) {}

    /// Invoked after a business failure has been recorded.
    async fn on_exception(&self, _task: &TaskRecord, _info: &ExceptionInfo) {}

    /// Invoked after the timed-out transition, from the run loop or the
    /// expiration sweep.
    async fn on_timed_out(&self, _task: &TaskRecord) {}
}
