//! Entry point for everything scoped to one project.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::api::{ApiClient, CallOptions, Endpoint, Transport};
use crate::automation::{Automation, AutomationKind};
use crate::error::{AiHeroError, Result};
use crate::promptstash::PromptStash;
use crate::schema::{ProjectInfo, Step, Workflow, WorkflowKind};
use crate::workflow::WorkflowHandle;

pub struct Project<T> {
    client: Arc<ApiClient<T>>,
    project_id: String,
    info: Option<ProjectInfo>,
}

impl<T: Transport> Project<T> {
    /// Check the id locally, then fetch the project to verify access.
    pub async fn open(client: Arc<ApiClient<T>>, project_id: &str) -> Result<Self> {
        if project_id.trim().is_empty() {
            return Err(AiHeroError::Precondition("Please provide a project_id".into()));
        }
        if Uuid::parse_str(project_id).is_err() {
            return Err(AiHeroError::Precondition(format!(
                "project_id should be a valid UUID, got '{project_id}'"
            )));
        }
        let mut project = Self {
            client,
            project_id: project_id.to_string(),
            info: None,
        };
        project.get().await?;
        Ok(project)
    }

    pub fn id(&self) -> &str {
        &self.project_id
    }

    pub fn client(&self) -> &Arc<ApiClient<T>> {
        &self.client
    }

    /// Re-fetch the project details and cache them.
    pub async fn get(&mut self) -> Result<&ProjectInfo> {
        let path = Endpoint::path(&["projects", &self.project_id])?;
        let options = self.client.resource_options("project", &self.project_id);
        let info: ProjectInfo = self.client.get_as(&path, &options).await?;
        Ok(self.info.insert(info))
    }

    pub fn snapshot(&self) -> Option<&ProjectInfo> {
        self.info.as_ref()
    }

    fn workflows_path(&self) -> Result<String> {
        Endpoint::path(&["projects", &self.project_id, "autonomous", "workflows"])
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let options = self
            .client
            .options(format!("Could not list workflows for project {}", self.project_id))
            .on(403, format!(
                "Could not get project {}. Please check the API key.",
                self.project_id
            ));
        let mut value = self.client.get(&self.workflows_path()?, &options).await?;
        let items = match value.get_mut("workflows").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AiHeroError::Schema(
                    "workflow listing has no 'workflows' array".into(),
                ));
            }
        };
        items.into_iter().map(Workflow::from_value).collect()
    }

    /// A handle on an existing workflow. Nothing is fetched until asked.
    pub fn workflow(&self, workflow_id: &str) -> WorkflowHandle<T> {
        WorkflowHandle::new(self.client.clone(), &self.project_id, workflow_id)
    }

    /// Create a simple workflow. Steps are normalized before they are sent.
    pub async fn create_workflow(
        &self,
        name: &str,
        description: &str,
        mut steps: Vec<Step>,
    ) -> Result<WorkflowHandle<T>> {
        if name.trim().is_empty() {
            return Err(AiHeroError::Precondition("workflow name cannot be empty".into()));
        }
        for step in &mut steps {
            step.normalize()?;
        }
        let body = json!({
            "name": name,
            "kind": WorkflowKind::Simple,
            "description": description,
            "steps": steps,
        });
        let options = self
            .client
            .options("Could not create a workflow")
            .on(400, "Could not create the workflow. ")
            .on(403, "Could not create. Please check the API key.")
            .on(404, "Could not find the workflow.");

        let value = self.client.post(&self.workflows_path()?, &body, &options).await?;
        let workflow = Workflow::from_value(value)?;
        info!(project_id = %self.project_id, workflow_id = %workflow.workflow_id, "workflow created");
        Ok(WorkflowHandle::new(self.client.clone(), &self.project_id, &workflow.workflow_id)
            .with_snapshot(workflow))
    }

    /// Upload a local file to the project's file store and return its name.
    pub async fn upload_file(&self, file: &Path) -> Result<String> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AiHeroError::Precondition(format!("'{}' is not a file path", file.display()))
            })?;
        let bytes = tokio::fs::read(file).await?;

        let path = Endpoint::path(&["projects", &self.project_id, "files", "uploads", &filename])?;
        let options: CallOptions = self
            .client
            .options("Could not upload the file")
            .on(400, "Could not upload the file. ")
            .on(403, format!(
                "Could not upload the file {}. Please check the API key.",
                file.display()
            ))
            .on(404, "Could not upload the file.");
        self.client.put_bytes(&path, bytes, &options).await?;
        info!(project_id = %self.project_id, %filename, "file uploaded");
        Ok(filename)
    }

    pub fn automation(&self, automation_id: &str, kind: AutomationKind) -> Result<Automation<T>> {
        Automation::new(self.client.clone(), automation_id, kind)
    }

    /// Telemetry sink for this project. Must be called inside a Tokio runtime.
    pub fn promptstash(&self) -> Result<PromptStash>
    where
        T: 'static,
    {
        PromptStash::new(self.client.clone(), &self.project_id)
    }
}
