//! Compile-time closed unit-of-work registry.
//!
//! Maps a record's (module, name) pair to a factory for its unit of work.
//! The set of valid pairs is fixed when the registry is assembled at startup,
//! so task records never drive arbitrary code loading. Resolution failure is
//! a fatal engine error, distinct from any business failure inside
//! `execute()`.

use std::collections::HashMap;
use std::fmt;

use super::TaskWork;
use crate::error::EngineError;
use crate::models::task::TaskRecord;

/// Key for unit-of-work lookup in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkKey {
    pub module: String,
    pub name: String,
}

impl WorkKey {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.name)
    }
}

type WorkFactory = Box<dyn Fn() -> Box<dyn TaskWork> + Send + Sync>;

/// Fixed mapping from task kind to unit-of-work factory.
#[derive(Default)]
pub struct WorkRegistry {
    factories: HashMap<WorkKey, WorkFactory>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, module: impl Into<String>, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn TaskWork> + Send + Sync + 'static,
    {
        self.factories
            .insert(WorkKey::new(module, name), Box::new(factory));
    }

    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.factories
            .contains_key(&WorkKey::new(module, name))
    }

    /// Instantiate the unit of work for a record.
    pub fn build(&self, task: &TaskRecord) -> Result<Box<dyn TaskWork>, EngineError> {
        let key = WorkKey::new(task.module.clone(), task.name.clone());
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| EngineError::UnknownTaskKind {
                module: task.module.clone(),
                name: task.name.clone(),
            })?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{ExceptionDetail, TaskMetaData, TaskStatus};
    use crate::tasks::WorkError;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;

    struct Noop;

    #[async_trait]
    impl TaskWork for Noop {
        async fn execute(&mut self, _task: &TaskRecord) -> Result<Option<Value>, WorkError> {
            Ok(None)
        }
    }

    fn record(module: &str, name: &str) -> TaskRecord {
        TaskRecord {
            id: 1,
            root_id: None,
            status: TaskStatus::Pending,
            module: module.to_string(),
            name: name.to_string(),
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
    fn test_resolves_registered_kind() {
        let mut registry = WorkRegistry::new();
        registry.register("project", "ExportProject", || Box::new(Noop));

        assert!(registry.contains("project", "ExportProject"));
        assert!(registry.build(&record("project", "ExportProject")).is_ok());
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let registry = WorkRegistry::new();
        let err = registry.build(&record("project", "ExportProject")).err().unwrap();
        assert!(matches!(
            err,
            EngineError::UnknownTaskKind { module, name }
                if module == "project" && name == "ExportProject"
        ));
    }

    #[test]
    fn test_work_key_display() {
        assert_eq!(
            WorkKey::new("project", "ImportProject").to_string(),
            "project/ImportProject"
        );
    }
}
