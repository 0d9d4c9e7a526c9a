//! PromptStash: fire-and-forget telemetry for prompt completions and
//! feedback.
//!
//! Records are validated on the caller's task and then handed to a bounded
//! queue drained by one background worker. Delivery failures are logged and
//! counted, never returned to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, CallOptions, Endpoint, Transport};
use crate::error::{AiHeroError, Result};

/// How long [`StashQueue::shutdown`] waits for the worker to drain.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A prompt is either a rendered string or a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionOutput {
    Text(String),
    Message(ChatMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub trace_id: String,
    pub step_id: String,
    pub template_id: String,
    /// MD5 digest identifying the template variant.
    pub variant: String,
    pub inputs: Map<String, Value>,
    pub rendered_inputs: String,
    pub prompt: Prompt,
    pub output: CompletionOutput,
    pub model: ModelInfo,
    /// Must carry at least `time`.
    pub metrics: Map<String, Value>,
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedbackRecord {
    pub trace_id: String,
    pub for_step_id: String,
    pub thumbs_up: bool,
    pub thumbs_down: bool,
    pub correction: Option<String>,
    pub annotations: Map<String, Value>,
    pub for_message_id: Option<String>,
    pub other: Map<String, Value>,
}

fn check_uuid(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AiHeroError::Precondition(format!("Please provide a {field}")));
    }
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| AiHeroError::Precondition(format!("{field} should be a valid UUID")))
}

fn check_slug(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AiHeroError::Precondition(format!(
            "{field} should be a valid slug (i.e. '^[-a-zA-Z0-9_]+$')"
        )));
    }
    Ok(())
}

fn check_md5(field: &str, value: &str) -> Result<()> {
    if value.len() != 32 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AiHeroError::Precondition(format!(
            "{field} should be a valid MD5 hash"
        )));
    }
    Ok(())
}

impl CompletionRecord {
    pub fn validate(&self) -> Result<()> {
        check_uuid("trace_id", &self.trace_id)?;
        check_uuid("step_id", &self.step_id)?;
        check_slug("template_id", &self.template_id)?;
        check_md5("variant", &self.variant)?;

        let empty_prompt = match &self.prompt {
            Prompt::Text(text) => text.is_empty(),
            Prompt::Messages(messages) => messages.is_empty(),
        };
        if empty_prompt {
            return Err(AiHeroError::Precondition("Please provide a prompt".into()));
        }
        if matches!(&self.output, CompletionOutput::Text(text) if text.is_empty()) {
            return Err(AiHeroError::Precondition("Please provide an output".into()));
        }
        if self.model.name.trim().is_empty() || self.model.version.trim().is_empty() {
            return Err(AiHeroError::Precondition(
                "model must have a name and a version".into(),
            ));
        }
        if !self.metrics.contains_key("time") {
            return Err(AiHeroError::Precondition("metrics must have a time".into()));
        }
        Ok(())
    }

    /// Embeddings are not computed client-side and are sent as `null`.
    fn into_payload(self) -> Value {
        json!({
            "trace_id": self.trace_id,
            "step_id": self.step_id,
            "step_type": "completion",
            "template_id": self.template_id,
            "variant": self.variant,
            "inputs": self.inputs,
            "rendered_inputs": self.rendered_inputs,
            "prompt": self.prompt,
            "output": self.output,
            "inputs_embedding": null,
            "prompt_embedding": null,
            "output_embedding": null,
            "model": self.model,
            "metrics": self.metrics,
            "other": self.other,
            "created_at": Utc::now().to_rfc3339(),
        })
    }
}

impl FeedbackRecord {
    pub fn validate(&self) -> Result<()> {
        check_uuid("trace_id", &self.trace_id)?;
        check_uuid("for_step_id", &self.for_step_id)?;
        if self.thumbs_up && self.thumbs_down {
            return Err(AiHeroError::Precondition(
                "thumbs_up and thumbs_down cannot both be True".into(),
            ));
        }
        if let Some(message_id) = &self.for_message_id {
            check_uuid("message_id", message_id)?;
        }
        Ok(())
    }

    /// Feedback is stored as its own step, pointing back at the step it rates.
    fn into_payload(self) -> Value {
        let mut other = self.other;
        other.insert("for_step_id".into(), Value::String(self.for_step_id));
        if let Some(message_id) = self.for_message_id {
            other.insert("for_message_id".into(), Value::String(message_id));
        }
        json!({
            "trace_id": self.trace_id,
            "step_id": Uuid::new_v4().to_string(),
            "step_type": "feedback",
            "thumbs_up": self.thumbs_up,
            "thumbs_down": self.thumbs_down,
            "correction": self.correction,
            "annotations": self.annotations,
            "other": other,
            "created_at": Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StashRejected {
    #[error("stash queue is full")]
    Full,
    #[error("stash queue is closed")]
    Closed,
}

/// Delivery counts reported when the queue shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StashReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Running delivery counts, shared between the worker and the queue so a
/// shutdown that gives up on the worker can still report what got through.
#[derive(Debug, Default)]
struct StashCounts {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl StashCounts {
    fn report(&self) -> StashReport {
        StashReport {
            delivered: self.delivered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug)]
struct StashItem {
    path: String,
    payload: Value,
}

/// Bounded queue plus one worker that POSTs each record in order.
pub struct StashQueue {
    tx: mpsc::Sender<StashItem>,
    worker: JoinHandle<()>,
    counts: Arc<StashCounts>,
}

impl StashQueue {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn<T>(client: Arc<ApiClient<T>>, capacity: usize) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AiHeroError::Config(format!("stash queue needs a Tokio runtime: {e}")))?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let options = client.options("Could not stash record");
        let counts = Arc::new(StashCounts::default());
        let worker = runtime.spawn(deliver(client, rx, options, counts.clone()));
        Ok(Self { tx, worker, counts })
    }

    /// Queue a POST of `payload` to `path` without waiting. Never blocks.
    pub fn enqueue(
        &self,
        path: impl Into<String>,
        payload: Value,
    ) -> std::result::Result<(), StashRejected> {
        let item = StashItem {
            path: path.into(),
            payload,
        };
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => StashRejected::Full,
            mpsc::error::TrySendError::Closed(_) => StashRejected::Closed,
        })
    }

    /// Close the queue, let the worker drain what is left, and report.
    ///
    /// A worker still busy after `join_timeout` is aborted; records it had
    /// not delivered yet are lost and the report holds the counts so far.
    pub async fn shutdown(self, join_timeout: Duration) -> StashReport {
        let Self {
            tx,
            mut worker,
            counts,
        } = self;
        drop(tx);
        match tokio::time::timeout(join_timeout, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "stash worker panicked"),
            Err(_) => {
                worker.abort();
                let _ = worker.await;
                let partial = counts.report();
                warn!(
                    timeout_ms = join_timeout.as_millis() as u64,
                    delivered = partial.delivered,
                    failed = partial.failed,
                    "stash worker did not finish within timeout, aborted"
                );
            }
        }
        counts.report()
    }
}

async fn deliver<T: Transport>(
    client: Arc<ApiClient<T>>,
    mut rx: mpsc::Receiver<StashItem>,
    options: CallOptions,
    counts: Arc<StashCounts>,
) {
    while let Some(item) = rx.recv().await {
        match client.post(&item.path, &item.payload, &options).await {
            Ok(_) => {
                counts.delivered.fetch_add(1, Ordering::SeqCst);
                debug!(path = %item.path, "record stashed");
            }
            Err(e) => {
                counts.failed.fetch_add(1, Ordering::SeqCst);
                warn!(path = %item.path, error = %e, "stash delivery failed");
            }
        }
    }
    let report = counts.report();
    info!(delivered = report.delivered, failed = report.failed, "stash worker drained");
}

/// Stash records for one project.
pub struct PromptStash {
    project_id: String,
    queue: StashQueue,
}

impl PromptStash {
    pub fn new<T>(client: Arc<ApiClient<T>>, project_id: &str) -> Result<Self>
    where
        T: Transport + 'static,
    {
        check_uuid("project_id", project_id)?;
        let capacity = client.config().stash_queue_capacity;
        Ok(Self {
            project_id: project_id.to_string(),
            queue: StashQueue::spawn(client, capacity)?,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Validate and queue a completion. Only validation errors are returned.
    pub fn stash_completion(&self, record: CompletionRecord) -> Result<()> {
        record.validate()?;
        self.submit(record.into_payload())
    }

    pub fn stash_feedback(&self, record: FeedbackRecord) -> Result<()> {
        record.validate()?;
        self.submit(record.into_payload())
    }

    fn submit(&self, payload: Value) -> Result<()> {
        let path = Endpoint::path(&["tools", "promptstash", "projects", &self.project_id, "stash"])?;
        if let Err(rejected) = self.queue.enqueue(path, payload) {
            warn!(project_id = %self.project_id, reason = %rejected, "stash record dropped");
        }
        Ok(())
    }

    /// Flush pending records and stop the worker.
    pub async fn shutdown(self) -> StashReport {
        self.queue.shutdown(DEFAULT_JOIN_TIMEOUT).await
    }
}
