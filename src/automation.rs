//! Automations: trainable server-side models addressed by id.
//!
//! Every automation shares the same job and inference endpoints. What
//! differs per [`AutomationKind`] is which training rows and prediction
//! queries make sense, so those are modelled as enums and checked against
//! the kind before anything is sent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::api::{ApiClient, CallOptions, Endpoint, Transport};
use crate::error::{AiHeroError, Result};
use crate::jobs::JobClient;
use crate::poll::{PollOutcome, Poller};
use crate::schema::Job;

/// Colours available to tag ontology entries, allocated from the back.
pub const COLORS: [&str; 15] = [
    "red", "orange", "amber", "yellow", "lime", "green", "emerald", "teal", "cyan", "sky", "blue",
    "indigo", "violet", "purple", "fuscia",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationKind {
    DetectSentiment,
    TagShortText,
    TagEntireImages,
    RecommendItemsToPeople,
    RecommendPeopleToEachOther,
    RecommendPeopleFromTwoGroupsToEachOther,
}

impl AutomationKind {
    pub const ALL: [AutomationKind; 6] = [
        AutomationKind::DetectSentiment,
        AutomationKind::TagShortText,
        AutomationKind::TagEntireImages,
        AutomationKind::RecommendItemsToPeople,
        AutomationKind::RecommendPeopleToEachOther,
        AutomationKind::RecommendPeopleFromTwoGroupsToEachOther,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationKind::DetectSentiment => "detect_sentiment",
            AutomationKind::TagShortText => "tag_short_text",
            AutomationKind::TagEntireImages => "tag_entire_images",
            AutomationKind::RecommendItemsToPeople => "recommend_items_to_people",
            AutomationKind::RecommendPeopleToEachOther => "recommend_people_to_each_other",
            AutomationKind::RecommendPeopleFromTwoGroupsToEachOther => {
                "recommend_people_from_two_groups_to_each_other"
            }
        }
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationKind {
    type Err = AiHeroError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                AiHeroError::Precondition(format!("Unsupported automation type for the API: {s}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    One,
    Two,
}

/// One piece of training data, submitted as a job and waited on.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingRow {
    ShortText {
        guid: String,
        text: String,
    },
    GroundTruth {
        guid: String,
        ground_truth: BTreeMap<String, bool>,
    },
    Image {
        guid: String,
        url: String,
    },
    Item {
        guid: String,
        attributes: Map<String, Value>,
    },
    Person {
        guid: String,
        attributes: Map<String, Value>,
    },
    GroupMember {
        group: Group,
        guid: String,
        attributes: Map<String, Value>,
    },
    Action {
        person_guid: String,
        item_guid: String,
        action_type: String,
        session_id: Option<String>,
        timestamp: Option<i64>,
        duration: Option<f64>,
        rating: Option<f64>,
    },
    Preference {
        person_guid: String,
        preference: Vec<Value>,
    },
}

/// An inference query. Never polled; the answer comes back inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Text { text: String, guid: Option<String> },
    Image { url: String },
    Recommendations { guid: String },
}

fn require(field: &str, value: &str, purpose: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AiHeroError::Precondition(format!(
            "You need to provide the {field} to {purpose} the automation with."
        )));
    }
    Ok(())
}

fn row_with_guid(attributes: &Map<String, Value>, guid: &str, what: &str) -> Result<Value> {
    if attributes.is_empty() {
        return Err(AiHeroError::Precondition(format!(
            "You need to provide the {what} to teach the automation with."
        )));
    }
    require("guid", guid, "teach")?;
    let mut row = attributes.clone();
    row.insert("guid".into(), Value::String(guid.to_string()));
    Ok(Value::Object(row))
}

fn url_pointer(url: &str) -> Value {
    json!({ "type": "url_pointer", "url": url })
}

fn mismatch(what: &str, kind: AutomationKind) -> AiHeroError {
    AiHeroError::Precondition(format!("{what} is not supported by a {kind} automation"))
}

impl TrainingRow {
    fn label(&self) -> &'static str {
        match self {
            TrainingRow::ShortText { .. } => "short text row",
            TrainingRow::GroundTruth { .. } => "ground truth",
            TrainingRow::Image { .. } => "image row",
            TrainingRow::Item { .. } => "item",
            TrainingRow::Person { .. } => "person",
            TrainingRow::GroupMember { .. } => "group member",
            TrainingRow::Action { .. } => "action",
            TrainingRow::Preference { .. } => "preference",
        }
    }

    /// The job body for this row, or a precondition error when the row does
    /// not fit `kind` or has blank fields.
    pub fn job_body(&self, kind: AutomationKind) -> Result<Value> {
        use AutomationKind::*;

        let supported = match self {
            TrainingRow::ShortText { .. } => matches!(kind, DetectSentiment | TagShortText),
            TrainingRow::GroundTruth { .. } => kind == DetectSentiment,
            TrainingRow::Image { .. } => kind == TagEntireImages,
            TrainingRow::Item { .. } | TrainingRow::Action { .. } | TrainingRow::Preference { .. } => {
                kind == RecommendItemsToPeople
            }
            TrainingRow::Person { .. } => {
                matches!(kind, RecommendItemsToPeople | RecommendPeopleToEachOther)
            }
            TrainingRow::GroupMember { .. } => kind == RecommendPeopleFromTwoGroupsToEachOther,
        };
        if !supported {
            return Err(mismatch(self.label(), kind));
        }

        let body = match self {
            TrainingRow::ShortText { guid, text } => {
                require("text", text, "teach")?;
                require("guid", guid, "teach")?;
                json!({ "type": "add_short_text", "row": { "text": text, "guid": guid } })
            }
            TrainingRow::GroundTruth { guid, ground_truth } => {
                require("guid", guid, "teach")?;
                json!({ "type": "set_ground_truth", "guid": guid, "ground_truth": ground_truth })
            }
            TrainingRow::Image { guid, url } => {
                require("image", url, "teach")?;
                require("guid", guid, "teach")?;
                json!({ "type": "ingest_row", "row": { "image": url_pointer(url), "guid": guid } })
            }
            TrainingRow::Item { guid, attributes } => {
                json!({ "type": "add_item", "row": row_with_guid(attributes, guid, "item")? })
            }
            TrainingRow::Person { guid, attributes } => {
                json!({ "type": "add_person", "row": row_with_guid(attributes, guid, "person")? })
            }
            TrainingRow::GroupMember {
                group,
                guid,
                attributes,
            } => {
                let job_type = match group {
                    Group::One => "add_person_to_group_one",
                    Group::Two => "add_person_to_group_two",
                };
                json!({ "type": job_type, "row": row_with_guid(attributes, guid, "person")? })
            }
            TrainingRow::Action {
                person_guid,
                item_guid,
                action_type,
                session_id,
                timestamp,
                duration,
                rating,
            } => {
                require("person_guid", person_guid, "teach")?;
                require("item_guid", item_guid, "teach")?;
                require("action_type", action_type, "teach")?;
                json!({
                    "type": "add_action",
                    "action": {
                        "person_guid": person_guid,
                        "item_guid": item_guid,
                        "action_type": action_type,
                        "session_id": session_id,
                        "timestamp": timestamp,
                        "duration": duration,
                        "rating": rating,
                    }
                })
            }
            TrainingRow::Preference {
                person_guid,
                preference,
            } => {
                require("person_guid", person_guid, "teach")?;
                json!({
                    "type": "add_preference",
                    "action": { "person_guid": person_guid, "preference": preference }
                })
            }
        };
        Ok(body)
    }
}

impl Prediction {
    /// `(task, payload)` for the inference call.
    pub fn inference(&self, kind: AutomationKind) -> Result<(&'static str, Value)> {
        use AutomationKind::*;

        match self {
            Prediction::Text { text, guid } => {
                require("text", text, "predict")?;
                match kind {
                    DetectSentiment => {
                        let guid = guid.as_deref().unwrap_or_default();
                        require("guid", guid, "predict")?;
                        Ok(("predict", json!({ "text": text, "guid": guid })))
                    }
                    TagShortText => Ok(("predict", json!({ "text": text }))),
                    other => Err(mismatch("text prediction", other)),
                }
            }
            Prediction::Image { url } => {
                if kind != TagEntireImages {
                    return Err(mismatch("image prediction", kind));
                }
                if url.trim().is_empty() {
                    return Err(AiHeroError::Precondition(
                        "image_url cannot be null or empty.".into(),
                    ));
                }
                Ok(("predict", json!({ "image": url_pointer(url) })))
            }
            Prediction::Recommendations { guid } => {
                if guid.trim().is_empty() {
                    return Err(AiHeroError::Precondition(
                        "person_id cannot be null or empty.".into(),
                    ));
                }
                match kind {
                    RecommendItemsToPeople => {
                        Ok(("get_recommendations", json!({ "guid": guid })))
                    }
                    RecommendPeopleToEachOther | RecommendPeopleFromTwoGroupsToEachOther => {
                        Ok(("get_recommendations", json!({ "thing_id": guid })))
                    }
                    other => Err(mismatch("recommendation query", other)),
                }
            }
        }
    }
}

/// Rebuild a tag ontology: entries for kept tags stay untouched, new tags get
/// the next free colour.
pub fn plan_ontology(existing: &[Value], tags: &[String]) -> Result<Vec<Value>> {
    let mut palette: Vec<&str> = COLORS.to_vec();
    let mut ontology = Vec::with_capacity(tags.len());
    let mut kept = Vec::new();

    for entry in existing {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !tags.iter().any(|t| t == name) {
            continue;
        }
        if let Some(color) = entry.get("color").and_then(Value::as_str) {
            palette.retain(|c| *c != color);
        }
        kept.push(name.to_string());
        ontology.push(entry.clone());
    }

    for tag in tags {
        if kept.contains(tag) {
            continue;
        }
        let color = palette.pop().ok_or_else(|| {
            AiHeroError::Precondition(format!(
                "no colour left for tag '{tag}'; at most {} tags are supported",
                COLORS.len()
            ))
        })?;
        kept.push(tag.clone());
        ontology.push(json!({ "type": "class", "_id": tag, "name": tag, "color": color }));
    }
    Ok(ontology)
}

pub struct Automation<T> {
    client: Arc<ApiClient<T>>,
    automation_id: String,
    kind: AutomationKind,
}

impl<T: Transport> Automation<T> {
    pub fn new(client: Arc<ApiClient<T>>, automation_id: &str, kind: AutomationKind) -> Result<Self> {
        if automation_id.trim().is_empty() {
            return Err(AiHeroError::Precondition(
                "automation_id cannot be null or empty.".into(),
            ));
        }
        Ok(Self {
            client,
            automation_id: automation_id.to_string(),
            kind,
        })
    }

    pub fn id(&self) -> &str {
        &self.automation_id
    }

    pub fn kind(&self) -> AutomationKind {
        self.kind
    }

    fn path(&self, tail: &[&str]) -> Result<String> {
        let mut segments = vec!["automations", self.automation_id.as_str()];
        segments.extend_from_slice(tail);
        Endpoint::path(&segments)
    }

    fn options(&self, error_msg: impl Into<String>) -> CallOptions {
        self.client.options(error_msg).on(
            403,
            format!(
                "Could not connect to automation {}. Please check the API key.",
                self.automation_id
            ),
        )
    }

    fn job_options(&self) -> CallOptions {
        self.options("Unknown error in job.")
            .on(400, "Please check the job parameters.")
    }

    fn fetch_options(&self) -> CallOptions {
        self.options("Unknown error in job.")
            .on(400, "Please check the request.")
    }

    fn context(&self, err: AiHeroError) -> AiHeroError {
        err.with_context(format!("automation {}", self.automation_id))
    }

    pub async fn get_definition(&self) -> Result<Value> {
        self.client
            .get(&self.path(&["definition"])?, &self.options("Couldn't get the definition."))
            .await
            .map_err(|e| self.context(e))
    }

    pub async fn update_ontology(&self, ontology: &[Value]) -> Result<Value> {
        let options = self
            .options("Unknown error in updating ontology.")
            .on(400, "Please check the ontology to be updated.");
        self.client
            .post(&self.path(&["definition", "ontology"])?, &ontology, &options)
            .await
            .map_err(|e| self.context(e))
    }

    /// Submit a job without waiting for it.
    pub async fn submit_job(&self, job: &Value) -> Result<Job> {
        JobClient::new(&self.client)
            .submit(&self.path(&[])?, job, &self.job_options())
            .await
            .map_err(|e| self.context(e))
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        JobClient::new(&self.client)
            .fetch(&self.path(&[])?, job_id, &self.fetch_options())
            .await
            .map_err(|e| self.context(e))
    }

    /// Submit a job and wait for it with the configured job cadence.
    pub async fn run_job(&self, job: &Value) -> Result<Job> {
        let poller = Poller::new(self.client.config().job_poll());
        Ok(self.run_job_with(job, &poller).await?.snapshot)
    }

    pub async fn run_job_with(&self, job: &Value, poller: &Poller) -> Result<PollOutcome<Job>> {
        let resource = self.path(&[])?;
        let jobs = JobClient::new(&self.client);
        let submitted = jobs
            .submit(&resource, job, &self.job_options())
            .await
            .map_err(|e| self.context(e))?;
        jobs.poll(&resource, &submitted.id, &self.fetch_options(), poller)
            .await
            .map_err(|e| self.context(e))
    }

    /// Ask the server to (re)analyse the automation's data. Not polled.
    pub async fn understand(&self) -> Result<Job> {
        self.submit_job(&json!({ "type": "understand" })).await
    }

    /// Single inference call; never polls.
    pub async fn infer(&self, task: &str, payload: &Value) -> Result<Value> {
        let options = self
            .options(format!("Unknown error in {task}."))
            .on(400, "Please check the data uploaded.");
        self.client
            .post(&self.path(&["inferences", task])?, payload, &options)
            .await
            .map_err(|e| self.context(e))
    }

    pub async fn teach(&self, row: &TrainingRow) -> Result<Job> {
        let body = row.job_body(self.kind)?;
        self.run_job(&body).await
    }

    pub async fn predict(&self, query: &Prediction) -> Result<Value> {
        let (task, payload) = query.inference(self.kind)?;
        self.infer(task, &payload).await
    }

    fn require_tagging(&self) -> Result<()> {
        if self.kind != AutomationKind::TagShortText {
            return Err(mismatch("tag ontology", self.kind));
        }
        Ok(())
    }

    /// Tag names from the automation's ontology.
    pub async fn tags(&self) -> Result<Vec<String>> {
        self.require_tagging()?;
        let definition = self.get_definition().await?;
        Ok(ontology_of(&definition)
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Replace the tag set and return the tags now on the server.
    pub async fn set_tags(&self, tags: &[String]) -> Result<Vec<String>> {
        self.require_tagging()?;
        let definition = self.get_definition().await?;
        let ontology = plan_ontology(ontology_of(&definition), tags)?;
        self.update_ontology(&ontology).await?;
        self.tags().await
    }
}

fn ontology_of(definition: &Value) -> &[Value] {
    definition
        .get("ontology")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
