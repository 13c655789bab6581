//! Project export/import task kinds.
//!
//! The engine's two shipped units of work. Both talk to the downstream
//! project services through [`ProjectServicesGateway`], move archives through
//! [`ArchiveStore`], and push `async-task-status-changed` events from every
//! lifecycle hook so clients can follow progress live.

pub mod export;
pub mod import;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::models::task::{TaskRecord, TaskStatus};
use crate::pusher::{projects_channel, Pusher, ASYNC_TASK_STATUS_CHANGED};
use crate::tasks::{WorkError, WorkRegistry};

pub use export::ExportProject;
pub use import::ImportProject;

/// Module tag the project kinds are registered under.
pub const MODULE: &str = "project";

/// Version tag written into every export archive.
pub const ARCHIVE_VERSION: u32 = 1;

/// Named sections of an export archive, one per downstream service.
pub const SETTINGS_SECTION: &str = "project_settings";
pub const FAQ_GRAPH_SECTION: &str = "faq_graph";
pub const SESSION_SECTION: &str = "conversation_session";

/// Storage path for a project's export archive.
pub fn export_archive_path(project_id: i64) -> String {
    format!("projects/{project_id}/export.json")
}

/// What a project export should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    ProjectSettings,
    Faq,
    Conversational,
}

/// Bot flavours attached to a project's autoflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotType {
    Faq,
    Conversational,
}

/// Autoflow build states; only `BotCreated` flows can be exported/imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoflowState {
    Draft,
    BotCreated,
}

/// One autoflow as reported by the configuration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autoflow {
    pub id: i64,
    pub bot_type: BotType,
    pub state: AutoflowState,
    pub graph_id: Option<i64>,
}

/// Failure surfaced by a downstream project service call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{service} call failed: {message}")]
    Upstream { service: String, message: String },

    #[error("{service} call timed out")]
    Timeout { service: String },
}

impl From<GatewayError> for WorkError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout { .. } => WorkError::TimedOut,
            upstream => {
                let message = upstream.to_string();
                WorkError::caused_by(message, upstream)
            }
        }
    }
}

/// Aggregated client over the downstream configuration, search-graph, and
/// conversation/session services.
#[async_trait]
pub trait ProjectServicesGateway: Send + Sync {
    async fn autoflows(
        &self,
        organization_id: i64,
        project_id: i64,
    ) -> Result<Vec<Autoflow>, GatewayError>;

    async fn export_settings(
        &self,
        organization_id: i64,
        project_id: i64,
        include_connections: bool,
    ) -> Result<Value, GatewayError>;

    async fn import_settings(
        &self,
        organization_id: i64,
        project_id: i64,
        payload: &Value,
    ) -> Result<(), GatewayError>;

    async fn export_graph(&self, project_id: i64, graph_id: i64) -> Result<Value, GatewayError>;

    /// Imports a graph and returns the id assigned by the search-graph service.
    async fn import_graph(&self, project_id: i64, payload: &Value) -> Result<i64, GatewayError>;

    /// Records a freshly imported graph id on the autoflow.
    async fn set_autoflow_graph(
        &self,
        organization_id: i64,
        project_id: i64,
        autoflow_id: i64,
        graph_id: i64,
    ) -> Result<(), GatewayError>;

    /// Id of the project's most recent conversation session, if any.
    async fn latest_session(&self, project_id: i64) -> Result<Option<i64>, GatewayError>;

    async fn export_session(&self, session_id: i64) -> Result<Value, GatewayError>;

    async fn import_session(
        &self,
        session_id: i64,
        payload: &Value,
    ) -> Result<(), GatewayError>;
}

/// Archive storage reachable by URL (S3-style with presigned links).
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store an archive and return a presigned download URL.
    async fn upload(&self, path: &str, archive: &Value) -> Result<String, GatewayError>;

    async fn download(&self, file_url: &str) -> Result<Value, GatewayError>;
}

/// Collaborators shared by the project task kinds.
#[derive(Clone)]
pub struct ProjectTaskDeps {
    pub gateway: Arc<dyn ProjectServicesGateway>,
    pub archives: Arc<dyn ArchiveStore>,
    pub pusher: Arc<dyn Pusher>,
    pub channel_namespace: String,
}

/// Register both project kinds with the unit-of-work registry.
pub fn register(registry: &mut WorkRegistry, deps: ProjectTaskDeps) {
    let export_deps = deps.clone();
    registry.register(MODULE, "ExportProject", move || {
        Box::new(ExportProject::new(export_deps.clone()))
    });
    registry.register(MODULE, "ImportProject", move || {
        Box::new(ImportProject::new(deps.clone()))
    });
}

/// Find the autoflow for a bot type, requiring it to have reached the
/// bot-created state.
fn created_autoflow<'a>(
    autoflows: &'a [Autoflow],
    bot_type: BotType,
    missing_message: &str,
) -> Result<&'a Autoflow, WorkError> {
    let autoflow = autoflows
        .iter()
        .find(|autoflow| autoflow.bot_type == bot_type)
        .ok_or_else(|| WorkError::failed(missing_message))?;
    if autoflow.state != AutoflowState::BotCreated {
        return Err(WorkError::failed(missing_message));
    }
    Ok(autoflow)
}

/// Trigger the status-changed push event shared by every project task hook.
async fn push_status(
    deps: &ProjectTaskDeps,
    task: &TaskRecord,
    status: TaskStatus,
    file_url: Option<&str>,
) {
    let mut payload = json!({
        "id": task.id,
        "project_id": task.meta_data.kwargs.get("project_id"),
        "status": status,
    });
    if let Some(url) = file_url {
        payload["file_url"] = json!(url);
    }

    let channel = projects_channel(&deps.channel_namespace);
    if let Err(e) = deps
        .pusher
        .trigger(&channel, ASYNC_TASK_STATUS_CHANGED, payload)
        .await
    {
        warn!(task_id = task.id, error = %e, "push gateway trigger failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autoflow(bot_type: BotType, state: AutoflowState) -> Autoflow {
        Autoflow {
            id: 5,
            bot_type,
            state,
            graph_id: Some(11),
        }
    }

    #[test]
    fn test_created_autoflow_requires_bot_created_state() {
        let flows = vec![autoflow(BotType::Faq, AutoflowState::Draft)];
        let err = created_autoflow(&flows, BotType::Faq, "FAQ Bot is not created.").unwrap_err();
        assert_eq!(err.to_string(), "FAQ Bot is not created.");

        let flows = vec![autoflow(BotType::Faq, AutoflowState::BotCreated)];
        assert!(created_autoflow(&flows, BotType::Faq, "FAQ Bot is not created.").is_ok());
    }

    #[test]
    fn test_gateway_timeout_maps_to_timed_out_work_error() {
        let err: WorkError = GatewayError::Timeout {
            service: "deepsearch".to_string(),
        }
        .into();
        assert!(matches!(err, WorkError::TimedOut));

        let err: WorkError = GatewayError::Upstream {
            service: "config".to_string(),
            message: "HTTP 502".to_string(),
        }
        .into();
        assert!(matches!(err, WorkError::Failed { .. }));
    }

    #[test]
    fn test_export_archive_path() {
        assert_eq!(export_archive_path(17), "projects/17/export.json");
    }
}
