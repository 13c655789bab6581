//! Engine-level error taxonomy.
//!
//! Engine-fatal errors (unknown task id, running a non-pending task, unknown
//! task kind or subscriber) signal a programming or configuration defect and
//! propagate to the caller. Business failures raised inside a unit of work
//! never surface here: they are absorbed by the run loop and recorded on the
//! task record itself.

use crate::models::task::TaskStatus;
use crate::store::StoreError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("task {task_id} not found")]
    TaskNotFound { task_id: i64 },

    #[error("task {task_id} is not pending (current status: {status})")]
    TaskNotPending { task_id: i64, status: TaskStatus },

    #[error("no task kind registered for {module}/{name}")]
    UnknownTaskKind { module: String, name: String },

    #[error("no subscriber registered under '{name}'")]
    UnknownSubscriber { name: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
