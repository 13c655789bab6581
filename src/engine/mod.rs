//! # Task Engine
//!
//! Orchestrates the life of a background task: creation and deferred
//! dispatch, the atomic pending claim, execution of the unit of work, status
//! transitions, retry scheduling, the expiration sweep, and notification
//! fan-out.
//!
//! The engine owns every status transition. Units of work only return a value
//! or raise; subscribers and push gateways only observe. Retry policy lives
//! here as well: the transport is told to disable its own retries, and a
//! failed attempt is retried by creating a brand-new record pointing at the
//! lineage root.

pub mod result;

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::task::{NewTask, TaskMetaData, TaskRecord, TaskStatus};
use crate::store::TaskStore;
use crate::subscribers::{send_notifications, SubscriberRegistry};
use crate::tasks::{TaskWork, WorkError, WorkRegistry};
use crate::transport::{DeferredTransport, RunDispatch};

pub use result::{ExceptionInfo, ExecutionResult};

/// User-facing message recorded on timed-out tasks.
pub const TIMED_OUT_MESSAGE: &str =
    "Looks like the server is taking too long to respond, please try again later.";

/// Request to create a task, with engine defaults for anything unset.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub module: String,
    pub name: String,
    pub root_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    /// Expiration window in seconds; the configured default when absent.
    pub timeout_secs: Option<u64>,
    pub meta_data: TaskMetaData,
    /// Retry budget; the configured default when absent.
    pub max_retry: Option<i32>,
}

impl CreateTask {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            root_id: None,
            reference_type: None,
            reference_id: None,
            timeout_secs: None,
            meta_data: TaskMetaData::default(),
            max_retry: None,
        }
    }

    pub fn with_reference(mut self, reference_type: impl Into<String>, reference_id: i64) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_meta_data(mut self, meta_data: TaskMetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn with_max_retry(mut self, max_retry: i32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }
}

/// The asynchronous task engine.
pub struct TaskEngine {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    transport: Arc<dyn DeferredTransport>,
    works: WorkRegistry,
    subscribers: SubscriberRegistry,
}

impl TaskEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TaskStore>,
        transport: Arc<dyn DeferredTransport>,
        works: WorkRegistry,
        subscribers: SubscriberRegistry,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            works,
            subscribers,
        }
    }

    /// Persist a new pending task and schedule its deferred run.
    ///
    /// Returns immediately with the pending record; the outcome is observed
    /// later by polling the record or through a subscriber.
    pub async fn create_task(&self, request: CreateTask) -> Result<TaskRecord> {
        info!(
            module = %request.module,
            name = %request.name,
            reference_type = ?request.reference_type,
            reference_id = ?request.reference_id,
            "creating async task"
        );

        let timeout_secs = request
            .timeout_secs
            .unwrap_or(self.config.expiration_timeout_secs);
        let expiration_time = Utc::now() + chrono::Duration::seconds(timeout_secs as i64);
        let max_retry = request.max_retry.unwrap_or(self.config.default_max_retry);

        let record = self
            .store
            .create(NewTask {
                module: request.module,
                name: request.name,
                root_id: request.root_id,
                reference_type: request.reference_type,
                reference_id: request.reference_id,
                expiration_time,
                meta_data: request.meta_data,
                max_retry,
            })
            .await?;

        // The engine owns retry policy, so transport-level retries stay off.
        let mut dispatch = RunDispatch::new(record.id);
        if let (Some(reference_id), Some(reference_type)) =
            (record.reference_id, record.reference_type.as_deref())
        {
            dispatch = dispatch
                .with_routing_key(RunDispatch::routing_key_for(reference_id, reference_type));
        }
        self.transport.schedule(dispatch).await?;

        Ok(record)
    }

    /// The transport's entry point: load, claim, execute, transition, retry,
    /// notify.
    ///
    /// Fatal engine errors (unknown id, record not pending) propagate to the
    /// caller; business failures inside the unit of work never do.
    pub async fn run_task(&self, task_id: i64) -> Result<TaskRecord> {
        let Some(mut record) = self.store.get(task_id).await? else {
            return Err(EngineError::TaskNotFound { task_id });
        };
        info!(task_id = record.id, module = %record.module, name = %record.name,
              "building and running task");

        let mut work = self.works.build(&record)?;

        if record.status != TaskStatus::Pending {
            return Err(EngineError::TaskNotPending {
                task_id,
                status: record.status,
            });
        }
        // Atomic claim: a concurrent duplicate delivery loses here and is
        // rejected as a non-retryable engine error.
        if !self.store.mark_running(task_id, Utc::now()).await? {
            return Err(EngineError::TaskNotPending {
                task_id,
                status: TaskStatus::Running,
            });
        }
        record.status = TaskStatus::Running;
        work.on_running(&record).await;

        let outcome = match AssertUnwindSafe(work.execute(&record)).catch_unwind().await {
            Ok(Ok(value)) => ExecutionResult::success(value),
            Ok(Err(WorkError::TimedOut)) => ExecutionResult::timed_out(),
            Ok(Err(err)) => ExecutionResult::errored(ExceptionInfo::from_work_error(&err)),
            Err(panic) => ExecutionResult::errored(ExceptionInfo::from_panic(panic)),
        };

        if outcome.is_success() {
            self.apply_success(&mut record);
            work.on_success(&record, outcome.return_value.as_ref()).await;
        } else {
            if let Some(info) = &outcome.exception_info {
                self.apply_exception(&mut record, info);
                work.on_exception(&record, info).await;
            } else {
                self.apply_timed_out(&mut record);
                work.on_timed_out(&record).await;
            }
            self.retry(&record).await?;
        }

        self.store.update(&record).await?;
        self.notify_result(&record).await?;

        Ok(record)
    }

    /// Expiration sweep: mark every pending/running task past its deadline as
    /// timed out and notify.
    ///
    /// Invoked by an external scheduler. Business logic is never run here;
    /// the sweep only marks tasks that have clearly stalled, oldest first.
    pub async fn cleanup_expired_tasks(&self) -> Result<Vec<TaskRecord>> {
        let expired = self.store.find_expired(Utc::now()).await?;
        let mut swept = Vec::with_capacity(expired.len());

        for mut record in expired {
            let work = self.works.build(&record)?;
            self.apply_timed_out(&mut record);
            work.on_timed_out(&record).await;
            self.store.update(&record).await?;
            self.notify_result(&record).await?;
            swept.push(record);
        }

        Ok(swept)
    }

    /// Pending/running tasks linked to a business entity, for caller-side
    /// dedupe before creating another export/import.
    pub async fn active_tasks_for(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> Result<Vec<TaskRecord>> {
        Ok(self
            .store
            .find_active_by_reference(reference_type, reference_id)
            .await?)
    }

    fn apply_success(&self, record: &mut TaskRecord) {
        if record.status != TaskStatus::Running {
            // Late or duplicate completion: keep the terminal status, keep the
            // evidence. The late return value is discarded.
            let note = format!("Task status = {} ran successfully!", record.status);
            warn!(task_id = record.id, status = %record.status, "{note}");
            record.exception_info.append_log(&note);
            return;
        }
        record.status = TaskStatus::Success;
        info!(task_id = record.id, "ran task {record} successfully");
    }

    fn apply_exception(&self, record: &mut TaskRecord, info: &ExceptionInfo) {
        // Only a running record moves to failed; evidence is recorded either way.
        if record.status == TaskStatus::Running {
            record.status = TaskStatus::Failed;
        }
        record.exception = Some(info.message.clone());
        record.exception_info.append_log(&info.trace);
        info!(task_id = record.id, error = %info.message,
              "exception occurred while running task");
    }

    fn apply_timed_out(&self, record: &mut TaskRecord) {
        record.status = TaskStatus::TimedOut;
        record.exception = Some(TIMED_OUT_MESSAGE.to_string());
        info!(task_id = record.id, "task timed out");
    }

    /// Create the next attempt in the lineage, unless the budget is spent.
    async fn retry(&self, record: &TaskRecord) -> Result<()> {
        if record.hit_max_retry() {
            info!(task_id = record.id, "hit retry limit");
            return Ok(());
        }

        self.create_task(CreateTask {
            module: record.module.clone(),
            name: record.name.clone(),
            root_id: Some(record.lineage_root()),
            reference_type: record.reference_type.clone(),
            reference_id: record.reference_id,
            timeout_secs: None,
            meta_data: record.meta_data.clone(),
            max_retry: Some(record.max_retry - 1),
        })
        .await?;

        Ok(())
    }

    /// Fan out to subscribers, but only for a final outcome: success, or a
    /// failure that has exhausted its retry budget. Transient failures with
    /// budget left stay quiet until the lineage settles.
    async fn notify_result(&self, record: &TaskRecord) -> Result<()> {
        if !(record.is_success() || record.hit_max_retry()) {
            return Ok(());
        }

        let subscribers = self.subscribers.build(&record.meta_data.subscribers)?;
        send_notifications(&subscribers, record).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::ExceptionDetail;
    use crate::store::InMemoryTaskStore;
    use crate::transport::{EventDrivenTransport, TransportError};
    use crate::events::EventPublisher;

    fn engine() -> TaskEngine {
        let publisher = EventPublisher::new(8);
        TaskEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(EventDrivenTransport::new(publisher)),
            WorkRegistry::new(),
            SubscriberRegistry::new(),
        )
    }

    fn record(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: 1,
            root_id: None,
            status,
            module: "project".to_string(),
            name: "ExportProject".to_string(),
            max_retry: 0,
            expiration_time: Utc::now(),
            reference_type: None,
            reference_id: None,
            meta_data: TaskMetaData::default(),
            exception: None,
            exception_info: ExceptionDetail::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_success_applies_only_to_running_records() {
        let engine = engine();

        let mut running = record(TaskStatus::Running);
        engine.apply_success(&mut running);
        assert_eq!(running.status, TaskStatus::Success);
        assert!(running.exception_info.log.is_none());
    }

    #[test]
    fn test_late_success_keeps_terminal_status_and_appends_warning() {
        let engine = engine();

        for status in [TaskStatus::Success, TaskStatus::Failed] {
            let mut task = record(status);
            engine.apply_success(&mut task);
            assert_eq!(task.status, status);
            let log = task.exception_info.log.unwrap();
            assert!(log.contains(&format!("Task status = {status} ran successfully!")));
        }
    }

    #[test]
    fn test_exception_only_fails_running_records_but_always_keeps_evidence() {
        let engine = engine();
        let info = ExceptionInfo {
            message: "boom".to_string(),
            trace: "boom\ncaused by: wire".to_string(),
        };

        let mut running = record(TaskStatus::Running);
        engine.apply_exception(&mut running, &info);
        assert_eq!(running.status, TaskStatus::Failed);
        assert_eq!(running.exception.as_deref(), Some("boom"));
        assert!(running.exception_info.log.unwrap().contains("caused by: wire"));

        let mut timed_out = record(TaskStatus::TimedOut);
        engine.apply_exception(&mut timed_out, &info);
        assert_eq!(timed_out.status, TaskStatus::TimedOut);
        assert_eq!(timed_out.exception.as_deref(), Some("boom"));
    }

    #[test]
    fn test_timed_out_sets_fixed_user_facing_message() {
        let engine = engine();
        let mut task = record(TaskStatus::Running);
        engine.apply_timed_out(&mut task);
        assert_eq!(task.status, TaskStatus::TimedOut);
        assert_eq!(task.exception.as_deref(), Some(TIMED_OUT_MESSAGE));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_from_create() {
        struct RejectingTransport;

        #[async_trait::async_trait]
        impl DeferredTransport for RejectingTransport {
            async fn schedule(
                &self,
                _dispatch: RunDispatch,
            ) -> std::result::Result<(), TransportError> {
                Err(TransportError::Rejected("bus unreachable".to_string()))
            }
        }

        let engine = TaskEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(RejectingTransport),
            WorkRegistry::new(),
            SubscriberRegistry::new(),
        );

        let err = engine
            .create_task(CreateTask::new("project", "ExportProject"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }
}
