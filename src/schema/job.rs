use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::poll::PollSnapshot;

/// A server-side job as returned by submit and fetch calls.
///
/// Only the id and state are typed. Every other field is kept verbatim in
/// `extra`, so re-serializing a job reproduces what the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

impl PollSnapshot for Job {
    fn state_token(&self) -> Option<&str> {
        self.state.as_deref()
    }

    fn failure_detail(&self) -> Option<String> {
        ["error", "message"]
            .iter()
            .filter_map(|key| self.extra.get(*key))
            .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_underscore_and_plain_id() {
        let job: Job = serde_json::from_value(json!({"_id": "j1", "state": "created"})).unwrap();
        assert_eq!(job.id, "j1");
        assert_eq!(job.state_token(), Some("created"));

        let job: Job = serde_json::from_value(json!({"id": "j2"})).unwrap();
        assert_eq!(job.id, "j2");
        assert_eq!(job.state_token(), None);
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(serde_json::from_value::<Job>(json!({"state": "done"})).is_err());
    }

    #[test]
    fn unknown_fields_survive_reserialization() {
        let raw = json!({"_id": "j1", "state": "done", "result": {"score": 0.9}, "kind": "teach"});
        let job: Job = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(job.field("kind"), Some(&json!("teach")));
        assert_eq!(serde_json::to_value(&job).unwrap(), raw);
    }

    #[test]
    fn failure_detail_prefers_error_field() {
        let job: Job = serde_json::from_value(json!({
            "_id": "j1",
            "state": "error",
            "error": "Error while uploading data",
            "message": "ignored"
        }))
        .unwrap();
        assert_eq!(job.failure_detail().as_deref(), Some("Error while uploading data"));

        let job: Job = serde_json::from_value(json!({"_id": "j1", "state": "error"})).unwrap();
        assert_eq!(job.failure_detail(), None);
    }
}
