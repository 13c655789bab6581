//! PostgreSQL-backed task store.
//!
//! Queries are built at runtime so the crate compiles without a live
//! database; the row shape is pinned by [`TaskRow`] and the DDL under
//! `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use super::{StoreError, TaskStore};
use crate::models::task::{ExceptionDetail, NewTask, TaskMetaData, TaskRecord};

const TASK_COLUMNS: &str = "id, root_id, status, module, name, max_retry, expiration_time, \
                            reference_type, reference_id, meta_data, exception, exception_info, \
                            created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape of the `async_tasks` table.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    root_id: Option<i64>,
    status: String,
    module: String,
    name: String,
    max_retry: i32,
    expiration_time: DateTime<Utc>,
    reference_type: Option<String>,
    reference_id: Option<i64>,
    meta_data: Option<Value>,
    exception: Option<String>,
    exception_info: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::InvalidStatus(row.status.clone()))?;
        let meta_data: TaskMetaData = row
            .meta_data
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let exception_info: ExceptionDetail = row
            .exception_info
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        Ok(TaskRecord {
            id: row.id,
            root_id: row.root_id,
            status,
            module: row.module,
            name: row.name,
            max_retry: row.max_retry,
            expiration_time: row.expiration_time,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            meta_data,
            exception: row.exception,
            exception_info,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, StoreError> {
        let meta_data = serde_json::to_value(&new_task.meta_data)?;
        let sql = format!(
            "INSERT INTO async_tasks \
             (root_id, status, module, name, max_retry, expiration_time, \
              reference_type, reference_id, meta_data, created_at, updated_at) \
             VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(new_task.root_id)
            .bind(&new_task.module)
            .bind(&new_task.name)
            .bind(new_task.max_retry)
            .bind(new_task.expiration_time)
            .bind(&new_task.reference_type)
            .bind(new_task.reference_id)
            .bind(meta_data)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM async_tasks WHERE id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TaskRecord::try_from).transpose()
    }

    async fn update(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let meta_data = serde_json::to_value(&record.meta_data)?;
        let exception_info = serde_json::to_value(&record.exception_info)?;
        sqlx::query(
            "UPDATE async_tasks \
             SET status = $2, max_retry = $3, expiration_time = $4, meta_data = $5, \
                 exception = $6, exception_info = $7, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.status.to_string())
        .bind(record.max_retry)
        .bind(record.expiration_time)
        .bind(meta_data)
        .bind(&record.exception)
        .bind(exception_info)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_running(&self, task_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE async_tasks SET status = 'running', updated_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(task_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM async_tasks \
             WHERE status IN ('pending', 'running') AND expiration_time < $1 \
             ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM async_tasks \
             WHERE status IN ('pending', 'running') \
               AND reference_type = $1 AND reference_id = $2 \
             ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }
}
