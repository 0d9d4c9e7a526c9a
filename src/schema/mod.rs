//! Typed views of the payloads the API exchanges.

mod job;
mod markdown;
mod step;
mod timestamp;
mod workflow;

pub use job::Job;
pub use markdown::{normalize_markdown_titles, normalize_title};
pub use step::{
    ChatStep, FilesStep, ImageStep, InstructionStep, MarkdownStep, NoteStep, ObjectStep,
    QueryStep, Step, StepBody, StepMode, WebpagesStep,
};
pub use workflow::{ProjectInfo, Workflow, WorkflowKind, WorkflowStatus};

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
