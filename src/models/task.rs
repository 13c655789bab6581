//! # Task Record Model
//!
//! The durable descriptor of one attempt at a unit of background work.
//!
//! A task record carries its identity, the (module, name) pair resolving its
//! unit of work, a retry budget, an absolute expiration deadline, an optional
//! link to the business entity it operates on, and a typed metadata payload
//! with the arguments and subscriber list.
//!
//! Retries never resurrect a record: each retry is a brand-new record carrying
//! `max_retry - 1` and pointing back at the lineage root through `root_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Task lifecycle states.
///
/// Records only ever move forward: `Pending -> Running -> {Success, Failed,
/// TimedOut}`. The three outcome states are terminal for that record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state; the record is persisted and a deferred run is scheduled.
    Pending,
    /// A worker has claimed the record and is executing the unit of work.
    Running,
    /// The unit of work returned normally.
    Success,
    /// The unit of work raised a business failure.
    Failed,
    /// The expiration deadline passed, or the work signalled a downstream timeout.
    TimedOut,
}

impl TaskStatus {
    /// Terminal states admit no further transition for this record.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::TimedOut)
    }

    /// Active states are the ones the expiration sweep considers.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("invalid task status: {s}")),
        }
    }
}

/// Typed task metadata: execution arguments, an application payload, and the
/// subscriber names notified on a final outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetaData {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub subscribers: Vec<String>,
}

/// Operator-facing diagnostic payload, independent of the short user-facing
/// `exception` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDetail {
    /// Free-form log, appended to on anomalous transitions.
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ExceptionDetail {
    /// Append a note to the diagnostic log, preserving anything already there.
    pub fn append_log(&mut self, note: &str) {
        match &mut self.log {
            Some(log) => log.push_str(note),
            None => self.log = Some(note.to_string()),
        }
    }
}

/// One durable attempt at a unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Opaque identifier assigned by the store on creation.
    pub id: i64,
    /// First attempt in this retry lineage, when this record is itself a retry.
    pub root_id: Option<i64>,
    pub status: TaskStatus,
    /// Together with `name`, resolves the unit-of-work kind in the registry.
    pub module: String,
    pub name: String,
    /// Remaining retry budget; 0 means no further retries.
    pub max_retry: i32,
    /// Absolute deadline after which the sweep treats this record as stalled.
    pub expiration_time: DateTime<Utc>,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub meta_data: TaskMetaData,
    /// Short user-facing failure message.
    pub exception: Option<String>,
    pub exception_info: ExceptionDetail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// The id of the first attempt in this lineage; the record's own id when
    /// it has no root.
    pub fn lineage_root(&self) -> i64 {
        self.root_id.unwrap_or(self.id)
    }

    pub fn hit_max_retry(&self) -> bool {
        self.max_retry == 0
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id={}, module={}, name={}", self.id, self.module, self.name)
    }
}

/// Creation payload; the store assigns the id and timestamps and forces the
/// status to [`TaskStatus::Pending`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub module: String,
    pub name: String,
    pub root_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub expiration_time: DateTime<Utc>,
    pub meta_data: TaskMetaData,
    pub max_retry: i32,
}
