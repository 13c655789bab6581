//! Project import unit of work.
//!
//! Downloads an export archive and replays each section it finds against the
//! matching downstream service. Sections absent from the archive are skipped;
//! an archive with no recognizable sections is a business failure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    created_autoflow, push_status, BotType, ProjectTaskDeps, FAQ_GRAPH_SECTION, SESSION_SECTION,
    SETTINGS_SECTION,
};
use crate::engine::result::ExceptionInfo;
use crate::models::task::{TaskRecord, TaskStatus};
use crate::tasks::{TaskWork, WorkError};

#[derive(Debug, Deserialize)]
struct ImportParams {
    project_id: i64,
    organization_id: i64,
    file_url: String,
}

pub struct ImportProject {
    deps: ProjectTaskDeps,
}

impl ImportProject {
    pub fn new(deps: ProjectTaskDeps) -> Self {
        Self { deps }
    }
}

/// Pull the section map out of a downloaded archive.
fn archive_sections(archive: &Value) -> Result<&Map<String, Value>, WorkError> {
    archive
        .get("sections")
        .and_then(Value::as_object)
        .filter(|sections| {
            [SETTINGS_SECTION, FAQ_GRAPH_SECTION, SESSION_SECTION]
                .iter()
                .any(|section| sections.contains_key(*section))
        })
        .ok_or_else(|| WorkError::failed("No valid import file found."))
}

#[async_trait]
impl TaskWork for ImportProject {
    async fn execute(&mut self, task: &TaskRecord) -> Result<Option<Value>, WorkError> {
        let params: ImportParams =
            serde_json::from_value(Value::Object(task.meta_data.kwargs.clone()))
                .map_err(|e| WorkError::failed(format!("invalid import arguments: {e}")))?;

        let archive = self.deps.archives.download(&params.file_url).await?;
        let sections = archive_sections(&archive)?;

        let gateway = &self.deps.gateway;
        let autoflows = gateway
            .autoflows(params.organization_id, params.project_id)
            .await?;

        if let Some(settings) = sections.get(SETTINGS_SECTION) {
            gateway
                .import_settings(params.organization_id, params.project_id, settings)
                .await?;
        }

        if let Some(graph) = sections.get(FAQ_GRAPH_SECTION) {
            let autoflow =
                created_autoflow(&autoflows, BotType::Faq, "FAQ Bot is not created.")?;
            let new_graph_id = gateway.import_graph(params.project_id, graph).await?;
            gateway
                .set_autoflow_graph(
                    params.organization_id,
                    params.project_id,
                    autoflow.id,
                    new_graph_id,
                )
                .await?;
        }

        if let Some(session) = sections.get(SESSION_SECTION) {
            created_autoflow(
                &autoflows,
                BotType::Conversational,
                "Conversational Bot is not created.",
            )?;
            let session_id = gateway
                .latest_session(params.project_id)
                .await?
                .ok_or_else(|| WorkError::failed("Project does not have any session."))?;
            gateway.import_session(session_id, session).await?;
        }

        Ok(Some(Value::Object(Map::new())))
    }

    async fn on_running(&self, task: &TaskRecord) {
        push_status(&self.deps, task, TaskStatus::Running, None).await;
    }

    async fn on_success(&self, task: &TaskRecord, _return_value: Option<&Value>) {
        push_status(&self.deps, task, TaskStatus::Success, None).await;
    }

    async fn on_exception(&self, task: &TaskRecord, _info: &ExceptionInfo) {
        push_status(&self.deps, task, TaskStatus::Failed, None).await;
    }

    async fn on_timed_out(&self, task: &TaskRecord) {
        push_status(&self.deps, task, TaskStatus::TimedOut, None).await;
    }
}
