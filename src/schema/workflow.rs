use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::step::Step;
use super::{null_default, timestamp};
use crate::error::{AiHeroError, Result};
use crate::poll::PollSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Success,
    Aborted,
    Failed,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Success => "success",
            WorkflowStatus::Aborted => "aborted",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Unknown => "unknown",
        }
    }

    /// A run is in flight; launching again is refused.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkflowStatus::Pending | WorkflowStatus::Running)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    #[default]
    Simple,
    Automated,
}

fn default_stage() -> String {
    "test".to_string()
}

/// Server-side workflow definition plus the fields of its latest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, deserialize_with = "null_default")]
    pub kind: WorkflowKind,
    pub project_id: String,
    pub workflow_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    /// The status word exactly as the server sent it, kept when `status`
    /// folds it into [`WorkflowStatus::Unknown`].
    #[serde(skip)]
    pub status_raw: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub computed_at: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub pinned: bool,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub archived: bool,

    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default, with = "timestamp")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_time: Option<f64>,
    #[serde(default)]
    pub version: Option<i64>,
}

impl Workflow {
    /// Decode a workflow from raw JSON, routing each step through
    /// [`Step::from_value`] so unknown step types surface as schema errors.
    pub fn from_value(mut value: Value) -> Result<Self> {
        let raw_steps = match value.as_object_mut() {
            Some(object) => object.remove("steps"),
            None => {
                return Err(AiHeroError::Schema(format!(
                    "workflow must be a JSON object, got: {value}"
                )));
            }
        };
        let steps = match raw_steps {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(Step::from_value)
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(AiHeroError::Schema(format!(
                    "workflow steps must be a list, got: {other}"
                )));
            }
        };

        let status_raw = value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut workflow: Workflow = serde_json::from_value(value)
            .map_err(|e| AiHeroError::Schema(format!("invalid workflow: {e}")))?;
        workflow.steps = steps;
        workflow.status_raw = status_raw;
        Ok(workflow)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_some_and(|s| s.is_active())
    }

    pub fn first_step_id(&self) -> Option<&str> {
        self.steps.first().map(|s| s.step_id.as_str())
    }

    /// Status as the server wrote it, falling back to the parsed variant.
    pub fn status_text(&self) -> Option<&str> {
        self.status_raw
            .as_deref()
            .or_else(|| self.status.as_ref().map(WorkflowStatus::as_str))
    }

    fn status_label(&self) -> &str {
        self.status_text().unwrap_or("unknown")
    }
}

impl PollSnapshot for Workflow {
    fn state_token(&self) -> Option<&str> {
        self.status_text()
    }

    fn failure_detail(&self) -> Option<String> {
        self.steps
            .iter()
            .find_map(|s| s.error.as_ref().filter(|e| !e.trim().is_empty()))
            .map(|e| format!("workflow {} {}: {e}", self.workflow_id, self.status_label()))
    }
}

/// Project details as returned by `GET /projects/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "null_default")]
    pub subscription: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub archived: bool,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}
