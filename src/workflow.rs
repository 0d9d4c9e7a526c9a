//! Handle on one workflow of a project: read it, launch it, wait for it.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::api::{ApiClient, CallOptions, Endpoint, Transport};
use crate::error::{AiHeroError, Result};
use crate::poll::{PollOutcome, Poller, StateVocabulary};
use crate::schema::Workflow;

pub struct WorkflowHandle<T> {
    client: Arc<ApiClient<T>>,
    project_id: String,
    workflow_id: String,
    snapshot: Option<Workflow>,
}

impl<T: Transport> WorkflowHandle<T> {
    pub(crate) fn new(client: Arc<ApiClient<T>>, project_id: &str, workflow_id: &str) -> Self {
        Self {
            client,
            project_id: project_id.to_string(),
            workflow_id: workflow_id.to_string(),
            snapshot: None,
        }
    }

    pub(crate) fn with_snapshot(mut self, workflow: Workflow) -> Self {
        self.snapshot = Some(workflow);
        self
    }

    pub fn id(&self) -> &str {
        &self.workflow_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The last snapshot fetched by [`get`](Self::get) or a launch.
    pub fn snapshot(&self) -> Option<&Workflow> {
        self.snapshot.as_ref()
    }

    /// Re-fetch the workflow and cache it. Has no server-side effect.
    pub async fn get(&mut self) -> Result<&Workflow> {
        let workflow = self.fetch().await.map_err(|e| self.context(e))?;
        Ok(self.snapshot.insert(workflow))
    }

    /// Launch with the configured workflow cadence and deadline.
    pub async fn launch(&mut self) -> Result<Workflow> {
        let poller = Poller::new(self.client.config().workflow_poll());
        let outcome = self.launch_with(&poller).await?;
        Ok(outcome.snapshot)
    }

    /// Start a run from the first step and poll until it reaches a terminal
    /// status.
    ///
    /// A workflow that is already `running` or `pending` is refused before
    /// any POST is issued. A run ending `failed` or `aborted` is reported as
    /// [`AiHeroError::RemoteJob`].
    pub async fn launch_with(&mut self, poller: &Poller) -> Result<PollOutcome<Workflow>> {
        let current = self.get().await?;
        let active = current
            .status
            .filter(|s| s.is_active())
            .map(|s| s.to_string());
        let first_step = current.first_step_id().map(str::to_string);

        if let Some(status) = active {
            return Err(self.context(AiHeroError::Precondition(format!(
                "Workflow is already running (status {status})."
            ))));
        }
        let first_step = match first_step {
            Some(step_id) => step_id,
            None => {
                return Err(self.context(AiHeroError::Precondition(
                    "Workflow has no steps to launch.".into(),
                )));
            }
        };

        let path = format!("{}/launch", self.path()?);
        let mut options = self.options();
        options.error_msg = format!("Could not launch workflow {}", self.workflow_id);
        self.client
            .post(&path, &json!({ "step_id": first_step }), &options)
            .await
            .map_err(|e| self.context(e))?;
        info!(workflow_id = %self.workflow_id, step_id = %first_step, "workflow launched");

        let outcome = poller
            .run(&self.workflow_id, &StateVocabulary::WORKFLOW, || self.fetch())
            .await
            .map_err(|e| self.context(e))?;
        self.snapshot = Some(outcome.snapshot.clone());
        Ok(outcome)
    }

    async fn fetch(&self) -> Result<Workflow> {
        let value = self.client.get(&self.path()?, &self.options()).await?;
        Workflow::from_value(value)
    }

    fn path(&self) -> Result<String> {
        Endpoint::path(&[
            "projects",
            &self.project_id,
            "autonomous",
            "workflows",
            &self.workflow_id,
        ])
    }

    fn options(&self) -> CallOptions {
        self.client.resource_options("workflow", &self.workflow_id)
    }

    fn context(&self, err: AiHeroError) -> AiHeroError {
        err.with_context(format!("workflow {}", self.workflow_id))
    }
}
