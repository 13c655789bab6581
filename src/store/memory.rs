//! In-memory task store.
//!
//! Mirrors the observable semantics of the Postgres store, including the
//! atomic pending claim. Used by the test suites and by embedded deployments
//! that do not need durability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{StoreError, TaskStore};
use crate::models::task::{ExceptionDetail, NewTask, TaskRecord, TaskStatus};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, TaskRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.rows.is_empty()
    }

    /// Snapshot of every record, ascending id.
    pub async fn all(&self) -> Vec<TaskRecord> {
        self.inner.lock().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let now = Utc::now();
        let record = TaskRecord {
            id: inner.next_id,
            root_id: new_task.root_id,
            status: TaskStatus::Pending,
            module: new_task.module,
            name: new_task.name,
            max_retry: new_task.max_retry,
            expiration_time: new_task.expiration_time,
            reference_type: new_task.reference_type,
            reference_id: new_task.reference_id,
            meta_data: new_task.meta_data,
            exception: None,
            exception_info: ExceptionDetail::default(),
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&task_id).cloned())
    }

    async fn update(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let mut updated = record.clone();
        updated.updated_at = Utc::now();
        inner.rows.insert(updated.id, updated);
        Ok(())
    }

    async fn mark_running(&self, task_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.rows.get_mut(&task_id) {
            Some(row) if row.status == TaskStatus::Pending => {
                row.status = TaskStatus::Running;
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .values()
            .filter(|row| row.status.is_active() && row.expiration_time < now)
            .cloned()
            .collect())
    }

    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .values()
            .filter(|row| {
                row.status.is_active()
                    && row.reference_type.as_deref() == Some(reference_type)
                    && row.reference_id == Some(reference_id)
            })
            .cloned()
            .collect())
    }
}
