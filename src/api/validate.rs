//! Fail-fast checks run before any request reaches the wire.

use std::collections::BTreeMap;

use url::Url;

use super::endpoint::Endpoint;
use super::transport::{Method, RequestBody};
use crate::error::{AiHeroError, Result};

/// Per-call override messages keyed by HTTP status code.
pub type NetworkErrors = BTreeMap<u16, String>;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Message table and limits for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    pub error_msg: String,
    pub network_errors: NetworkErrors,
    pub timeout_secs: u64,
    pub extra_headers: Vec<(String, String)>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new("Error")
    }
}

impl CallOptions {
    pub fn new(error_msg: impl Into<String>) -> Self {
        Self {
            error_msg: error_msg.into(),
            network_errors: NetworkErrors::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            extra_headers: Vec::new(),
        }
    }

    /// Override the message reported for `status`.
    #[must_use]
    pub fn on(mut self, status: u16, message: impl Into<String>) -> Self {
        self.network_errors.insert(status, message.into());
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// The 400/403/404 table shared by every facade read of a single resource.
    pub fn resource(kind: &str, id: &str) -> Self {
        Self::new(format!("Could not fetch details for {kind} {id}"))
            .on(400, format!("Please check the {kind}_id."))
            .on(
                403,
                format!("Could not get {kind} {id}. Please check the API key."),
            )
            .on(404, format!("Could not find the {kind}."))
    }
}

/// Check a call before it is issued and return the absolute URL it targets.
pub fn validate(
    endpoint: &Endpoint,
    method: Method,
    path: &str,
    body: &RequestBody,
    options: &CallOptions,
) -> Result<Url> {
    if path.is_empty() {
        return Err(precondition("Please provide a path"));
    }
    if !path.starts_with('/') {
        return Err(precondition("path should start with '/'"));
    }
    if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(precondition(format!("Invalid path '{path}'")));
    }
    if options.error_msg.trim().is_empty() {
        return Err(precondition("Please provide an error_msg"));
    }
    for (status, message) in &options.network_errors {
        if !(100..=599).contains(status) {
            return Err(precondition(format!(
                "key {status} in network_errors should be an HTTP status code"
            )));
        }
        if message.trim().is_empty() {
            return Err(precondition(format!(
                "message for {status} in network_errors should not be empty"
            )));
        }
    }
    if options.timeout_secs == 0 {
        return Err(precondition("timeout should be a positive number of seconds"));
    }
    match (method, body) {
        (Method::Get, RequestBody::Empty) => {}
        (Method::Get, _) => return Err(precondition("GET requests carry no body")),
        (Method::Post | Method::Put, RequestBody::Empty) => {
            return Err(precondition(format!("{method} requests need a body")));
        }
        _ => {}
    }

    let url = endpoint.join(path)?;
    if url.host_str().is_none() {
        return Err(precondition(format!("Invalid path '{path}'")));
    }
    Ok(url)
}

fn precondition(message: impl Into<String>) -> AiHeroError {
    AiHeroError::Precondition(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> Endpoint {
        Endpoint::new("https://app.aihero.studio/").unwrap()
    }

    fn check(path: &str, options: &CallOptions) -> Result<Url> {
        validate(&endpoint(), Method::Get, path, &RequestBody::Empty, options)
    }

    #[test]
    fn accepts_well_formed_call() {
        let url = check("/projects/p1", &CallOptions::resource("project", "p1")).unwrap();
        assert_eq!(url.as_str(), "https://app.aihero.studio/api/v1/projects/p1");
    }

    #[test]
    fn rejects_malformed_paths() {
        let options = CallOptions::default();
        for path in ["", "projects", "projects/p1", "/projects/p 1", "/a\tb", "/a\nb"] {
            let err = check(path, &options).unwrap_err();
            assert!(
                matches!(err, AiHeroError::Precondition(_)),
                "path {path:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_blank_error_msg() {
        let err = check("/projects", &CallOptions::new("  ")).unwrap_err();
        assert!(err.to_string().contains("error_msg"));
    }

    #[test]
    fn rejects_out_of_range_status_keys() {
        let options = CallOptions::default().on(42, "odd");
        assert!(matches!(
            check("/projects", &options),
            Err(AiHeroError::Precondition(_))
        ));
        let options = CallOptions::default().on(700, "odd");
        assert!(check("/projects", &options).is_err());
        let options = CallOptions::default().on(404, "");
        assert!(check("/projects", &options).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let options = CallOptions::default().timeout_secs(0);
        assert!(matches!(
            check("/projects", &options),
            Err(AiHeroError::Precondition(_))
        ));
    }

    #[test]
    fn body_presence_matches_method() {
        let options = CallOptions::default();
        let with_body = RequestBody::Json(json!({"a": 1}));
        assert!(validate(&endpoint(), Method::Get, "/x", &with_body, &options).is_err());
        assert!(validate(&endpoint(), Method::Post, "/x", &RequestBody::Empty, &options).is_err());
        assert!(validate(&endpoint(), Method::Post, "/x", &with_body, &options).is_ok());
        let bytes = RequestBody::Bytes(vec![1, 2, 3]);
        assert!(validate(&endpoint(), Method::Put, "/x", &bytes, &options).is_ok());
    }

    #[test]
    fn resource_table_has_standard_overrides() {
        let options = CallOptions::resource("workflow", "wf-1");
        assert_eq!(options.network_errors[&400], "Please check the workflow_id.");
        assert!(options.network_errors[&403].contains("API key"));
        assert_eq!(options.network_errors[&404], "Could not find the workflow.");
    }
}
