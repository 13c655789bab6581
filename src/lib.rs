//! # Deferred Core
//!
//! Durable asynchronous task engine: creation, deferred dispatch, atomic run
//! claiming, retry lineages, expiration sweeps, and completion notification
//! fan-out.
//!
//! ## Overview
//!
//! An HTTP handler (or any caller) asks the engine to create a task; the
//! engine persists a pending record and hands a dispatch descriptor to the
//! deferred execution transport. Some worker later invokes the run entry
//! point, which claims the record, executes its unit of work, applies the
//! status transition, schedules a retry when the attempt failed, and notifies
//! subscribers once the lineage reaches a final outcome. A periodic sweep
//! marks stalled records as timed out.
//!
//! ## Module Organization
//!
//! - [`models`] - the durable task record, status states, and typed metadata
//! - [`store`] - the record store seam, with Postgres and in-memory backends
//! - [`engine`] - the task engine: create / run / sweep and the result model
//! - [`tasks`] - the unit-of-work trait, registry, and project export/import
//! - [`subscribers`] - notification sinks resolved from a fixed registry
//! - [`transport`] - the deferred execution seam
//! - [`pusher`] - the push gateway seam for status-changed events
//! - [`events`] - in-process broadcast publisher backing transport and pusher
//! - [`config`] - engine configuration
//! - [`error`] - the engine-level error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use deferred_core::config::EngineConfig;
//! use deferred_core::engine::{CreateTask, TaskEngine};
//! use deferred_core::events::EventPublisher;
//! use deferred_core::store::InMemoryTaskStore;
//! use deferred_core::subscribers::SubscriberRegistry;
//! use deferred_core::tasks::WorkRegistry;
//! use deferred_core::transport::EventDrivenTransport;
//!
//! # async fn example() -> deferred_core::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let publisher = EventPublisher::new(config.event_channel_capacity);
//! let engine = TaskEngine::new(
//!     config,
//!     Arc::new(InMemoryTaskStore::new()),
//!     Arc::new(EventDrivenTransport::new(publisher)),
//!     WorkRegistry::new(),
//!     SubscriberRegistry::new(),
//! );
//!
//! let record = engine
//!     .create_task(CreateTask::new("project", "ExportProject").with_reference("project", 17))
//!     .await?;
//! println!("task {} is {}", record.id, record.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod pusher;
pub mod store;
pub mod subscribers;
pub mod tasks;
pub mod transport;

pub use config::EngineConfig;
pub use engine::{CreateTask, ExceptionInfo, ExecutionResult, TaskEngine};
pub use error::{EngineError, Result};
pub use models::task::{TaskMetaData, TaskRecord, TaskStatus};
pub use store::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use subscribers::{Subscriber, SubscriberRegistry};
pub use tasks::{TaskWork, WorkError, WorkRegistry};
pub use transport::{DeferredTransport, EventDrivenTransport, RunDispatch};
