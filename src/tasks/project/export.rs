//! Project export unit of work.
//!
//! Collects the requested sections from the downstream services, assembles
//! them into a versioned archive, uploads it, and returns the presigned
//! download URL. The URL is remembered so the success push event can carry it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    created_autoflow, export_archive_path, push_status, BotType, ExportType, ProjectTaskDeps,
    ARCHIVE_VERSION, FAQ_GRAPH_SECTION, SESSION_SECTION, SETTINGS_SECTION,
};
use crate::engine::result::ExceptionInfo;
use crate::models::task::{TaskRecord, TaskStatus};
use crate::tasks::{TaskWork, WorkError};

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[allow(dead_code)]
    account_id: i64,
    project_id: i64,
    organization_id: i64,
    export_types: Vec<ExportType>,
    #[serde(default)]
    export_connections: bool,
}

pub struct ExportProject {
    deps: ProjectTaskDeps,
    file_url: Option<String>,
}

impl ExportProject {
    pub fn new(deps: ProjectTaskDeps) -> Self {
        Self {
            deps,
            file_url: None,
        }
    }
}

#[async_trait]
impl TaskWork for ExportProject {
    async fn execute(&mut self, task: &TaskRecord) -> Result<Option<Value>, WorkError> {
        let params: ExportParams =
            serde_json::from_value(Value::Object(task.meta_data.kwargs.clone()))
                .map_err(|e| WorkError::failed(format!("invalid export arguments: {e}")))?;

        let gateway = &self.deps.gateway;
        let autoflows = gateway
            .autoflows(params.organization_id, params.project_id)
            .await?;

        let mut sections = Map::new();
        for export_type in &params.export_types {
            match export_type {
                ExportType::ProjectSettings => {
                    let settings = gateway
                        .export_settings(
                            params.organization_id,
                            params.project_id,
                            params.export_connections,
                        )
                        .await?;
                    sections.insert(SETTINGS_SECTION.to_string(), settings);
                }
                ExportType::Faq => {
                    let autoflow =
                        created_autoflow(&autoflows, BotType::Faq, "FAQ Bot is not created.")?;
                    let graph_id = autoflow
                        .graph_id
                        .ok_or_else(|| WorkError::failed("FAQ Bot has no graph."))?;
                    let graph = gateway.export_graph(params.project_id, graph_id).await?;
                    sections.insert(FAQ_GRAPH_SECTION.to_string(), graph);
                }
                ExportType::Conversational => {
                    created_autoflow(
                        &autoflows,
                        BotType::Conversational,
                        "Conversational Bot is not created.",
                    )?;
                    let session_id = gateway
                        .latest_session(params.project_id)
                        .await?
                        .ok_or_else(|| WorkError::failed("Project does not have any session."))?;
                    let session = gateway.export_session(session_id).await?;
                    sections.insert(SESSION_SECTION.to_string(), session);
                }
            }
        }

        let archive = json!({
            "version": ARCHIVE_VERSION,
            "sections": sections,
        });
        let file_url = self
            .deps
            .archives
            .upload(&export_archive_path(params.project_id), &archive)
            .await?;

        self.file_url = Some(file_url.clone());
        Ok(Some(Value::String(file_url)))
    }

    async fn on_running(&self, task: &TaskRecord) {
        push_status(&self.deps, task, TaskStatus::Running, None).await;
    }

    async fn on_success(&self, task: &TaskRecord, _return_value: Option<&Value>) {
        push_status(&self.deps, task, TaskStatus::Success, self.file_url.as_deref()).await;
    }

    async fn on_exception(&self, task: &TaskRecord, _info: &ExceptionInfo) {
        push_status(&self.deps, task, TaskStatus::Failed, None).await;
    }

    async fn on_timed_out(&self, task: &TaskRecord) {
        push_status(&self.deps, task, TaskStatus::TimedOut, None).await;
    }
}
