//! Client SDK for the AI Hero platform.
//!
//! Every HTTP call goes through [`api::ApiClient`], which validates the call
//! locally, sends it over a [`api::Transport`], and classifies non-2xx
//! answers into [`AiHeroError`]. Long-running server work (automation jobs,
//! workflow runs) is awaited with the [`poll::Poller`], which owns cadence,
//! deadline, cancellation and transient-retry policy.
//!
//! ```no_run
//! use std::sync::Arc;
//! use aihero::{Client, Project, SdkConfig};
//!
//! # async fn demo() -> aihero::Result<()> {
//! let client = Arc::new(Client::connect(SdkConfig::load()?)?);
//! let project = Project::open(client, "0f8fad5b-d9cb-469f-a165-70867728950e").await?;
//! let mut workflow = project.workflow("wf-1");
//! let finished = workflow.launch().await?;
//! println!("{}", finished.status.map(|s| s.to_string()).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod automation;
pub mod config;
pub mod error;
pub mod jobs;
pub mod poll;
pub mod project;
pub mod promptstash;
pub mod schema;
pub mod ui;
pub mod workflow;

pub use api::{ApiClient, CallOptions, Client, Transport};
pub use automation::{Automation, AutomationKind, Prediction, TrainingRow};
pub use config::SdkConfig;
pub use error::{AiHeroError, ErrorKind, Result};
pub use jobs::JobClient;
pub use poll::{PollConfig, PollOutcome, Poller, RetryConfig};
pub use project::Project;
pub use promptstash::{CompletionRecord, FeedbackRecord, PromptStash, StashReport};
pub use schema::{Job, ProjectInfo, Step, Workflow, WorkflowStatus};
pub use workflow::WorkflowHandle;
