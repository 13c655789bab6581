//! Durable task record store seam.
//!
//! The engine needs exactly this narrow surface from the store: create a row,
//! read one by id, persist in-place mutations, atomically claim a pending row
//! for running, and two filtered queries (the expiration sweep and the
//! caller-side dedupe check).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::task::{NewTask, TaskRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid status '{0}' in stored record")]
    InvalidStatus(String),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new record. The store assigns the id, forces the status to
    /// pending, and stamps created/updated times.
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, StoreError>;

    async fn get(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError>;

    /// Persist in-place mutations of an existing record, refreshing its
    /// updated stamp.
    async fn update(&self, record: &TaskRecord) -> Result<(), StoreError>;

    /// Atomically claim a pending record for running.
    ///
    /// This is a single conditional update (`status = running` where the row
    /// is still pending); the returned boolean is the affected-row count, so
    /// concurrent duplicate deliveries cannot both win the claim.
    async fn mark_running(&self, task_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Pending/running records whose expiration deadline is strictly before
    /// `now`, oldest id first.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>, StoreError>;

    /// Pending/running records linked to the given business entity, used by
    /// callers to dedupe before creating a new task.
    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> Result<Vec<TaskRecord>, StoreError>;
}

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;
