use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use super::markdown::normalize_markdown_titles;
use super::null_default;
use crate::error::{AiHeroError, Result};

/// Operational mode of a step inside the workflow editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    Editing,
    Expects,
    Processing,
    #[default]
    Output,
    Improve,
    Improving,
}

/// One step of a workflow. The variant payload is selected by the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, deserialize_with = "null_default")]
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub mode: StepMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: StepBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepBody {
    Markdown(MarkdownStep),
    Instruction(InstructionStep),
    Image(ImageStep),
    Chat(ChatStep),
    Note(NoteStep),
    Webpages(WebpagesStep),
    Files(FilesStep),
    Object(ObjectStep),
    Query(QueryStep),
}

impl StepBody {
    pub const TYPES: [&'static str; 9] = [
        "markdown",
        "instruction",
        "image",
        "chat",
        "note",
        "webpages",
        "files",
        "object",
        "query",
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            StepBody::Markdown(_) => "markdown",
            StepBody::Instruction(_) => "instruction",
            StepBody::Image(_) => "image",
            StepBody::Chat(_) => "chat",
            StepBody::Note(_) => "note",
            StepBody::Webpages(_) => "webpages",
            StepBody::Files(_) => "files",
            StepBody::Object(_) => "object",
            StepBody::Query(_) => "query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownStep {
    pub markdown: String,
}

/// Human-only documentation; the agent never sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteStep {
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstructionStep {
    pub instruction: String,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub mute: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub pinned: bool,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub partial: bool,
    #[serde(default)]
    pub computed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStep {
    pub instruction: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatStep {
    #[serde(default, deserialize_with = "null_default")]
    pub messages: Vec<Map<String, Value>>,
    #[serde(default, deserialize_with = "null_default")]
    pub partial: bool,
    #[serde(default)]
    pub computed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebpagesStep {
    #[serde(default, deserialize_with = "null_default")]
    pub urls: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub metadata_webpages: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub processed_webpages: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub reload: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilesStep {
    #[serde(default, deserialize_with = "null_default")]
    pub files: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub processed_files: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub metadata_files: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub reload: bool,
}

/// Structured output constrained by a JSON schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectStep {
    #[serde(default, deserialize_with = "null_default")]
    pub json_schema: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub json_object: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub partial: bool,
    #[serde(default)]
    pub computed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryStep {
    #[serde(default, deserialize_with = "null_default")]
    pub query: String,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "null_default")]
    pub partial: bool,
    #[serde(default)]
    pub computed_at: Option<i64>,
}

impl Step {
    /// A step with no id yet; [`Step::normalize`] assigns one.
    pub fn new(body: StepBody) -> Self {
        Self {
            step_id: String::new(),
            description: None,
            mode: StepMode::default(),
            error: None,
            body,
        }
    }

    pub fn markdown(markdown: impl Into<String>) -> Self {
        Self::new(StepBody::Markdown(MarkdownStep {
            markdown: markdown.into(),
        }))
    }

    pub fn instruction(instruction: impl Into<String>) -> Self {
        Self::new(StepBody::Instruction(InstructionStep {
            instruction: instruction.into(),
            ..Default::default()
        }))
    }

    pub fn webpages<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepBody::Webpages(WebpagesStep {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }))
    }

    pub fn files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepBody::Files(FilesStep {
            files: files.into_iter().map(Into::into).collect(),
            ..Default::default()
        }))
    }

    #[must_use]
    pub fn with_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = step_id.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.body.type_name()
    }

    /// Decode one step from raw JSON and normalize it.
    ///
    /// A missing or unknown `type` tag is a schema error, as is any payload
    /// that does not fit the tagged variant.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => {
                return Err(AiHeroError::Schema(format!("Unknown step type: {other}")));
            }
            None => {
                return Err(AiHeroError::Schema(format!("step has no type: {value}")));
            }
        };
        if !StepBody::TYPES.contains(&kind.as_str()) {
            return Err(AiHeroError::Schema(format!("Unknown step type: {kind}")));
        }

        let mut step: Step = serde_json::from_value(value)
            .map_err(|e| AiHeroError::Schema(format!("invalid {kind} step: {e}")))?;
        step.normalize()?;
        Ok(step)
    }

    /// Fill in a missing id and canonicalize the payload.
    ///
    /// Markdown headings are title-cased, webpage URLs must be http(s) and are
    /// normalized, and file references are reduced to their file name.
    pub fn normalize(&mut self) -> Result<()> {
        if self.step_id.trim().is_empty() {
            self.step_id = Uuid::new_v4().to_string();
        }

        match &mut self.body {
            StepBody::Markdown(step) => step.markdown = normalize_markdown_titles(&step.markdown),
            StepBody::Note(step) => step.markdown = normalize_markdown_titles(&step.markdown),
            StepBody::Instruction(step) => {
                if let Some(markdown) = step.markdown.as_mut().filter(|m| !m.is_empty()) {
                    *markdown = normalize_markdown_titles(markdown);
                }
            }
            StepBody::Webpages(step) => {
                step.urls = step
                    .urls
                    .iter()
                    .map(|u| normalize_url(u))
                    .collect::<Result<_>>()?;
            }
            StepBody::Files(step) => {
                step.files = step
                    .files
                    .iter()
                    .map(|f| normalize_filename(f))
                    .collect::<Result<_>>()?;
            }
            StepBody::Image(_) | StepBody::Chat(_) | StepBody::Object(_) | StepBody::Query(_) => {}
        }
        Ok(())
    }
}

fn normalize_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AiHeroError::Schema(format!("Invalid URL {raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AiHeroError::Schema(format!("Invalid URL {raw}")));
    }
    Ok(url.to_string())
}

fn normalize_filename(raw: &str) -> Result<String> {
    if raw.contains("/./") || raw.contains("/../") {
        return Err(AiHeroError::Schema(format!("Invalid filename {raw}")));
    }
    Path::new(raw)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AiHeroError::Schema(format!("Invalid filename {raw}")))
}
