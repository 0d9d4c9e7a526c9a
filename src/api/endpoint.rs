use url::Url;

use crate::error::{AiHeroError, Result};

const API_PREFIX: &str = "/api/v1";

/// Normalized API root: the server URL with one trailing `/` stripped and
/// `/api/v1` appended. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    pub fn new(server_url: &str) -> Result<Self> {
        let parsed = Url::parse(server_url.trim())
            .map_err(|e| AiHeroError::Config(format!("invalid server url '{server_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AiHeroError::Config(format!(
                "server url must use http or https, got: {server_url}"
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(AiHeroError::Config(format!(
                "server url must not carry a query or fragment: {server_url}"
            )));
        }

        let mut base = server_url.trim().to_string();
        if base.ends_with('/') {
            base.pop();
        }
        if base.ends_with('/') {
            return Err(AiHeroError::Config(format!(
                "server url must not end with more than one '/': {server_url}"
            )));
        }
        base.push_str(API_PREFIX);
        Ok(Self { base })
    }

    /// The normalized base, e.g. `https://app.aihero.studio/api/v1`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute URL for an already validated path.
    pub fn join(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base, path))
            .map_err(|e| AiHeroError::Precondition(format!("Invalid path '{path}': {e}")))
    }

    /// Build a `/a/b/c` path from raw segments, percent-encoding each one.
    pub fn path(segments: &[&str]) -> Result<String> {
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(AiHeroError::Precondition(format!(
                "path segments must not be blank: {segments:?}"
            )));
        }
        let mut scratch = Url::parse("http://localhost/")
            .map_err(|e| AiHeroError::Precondition(e.to_string()))?;
        scratch
            .path_segments_mut()
            .map_err(|_| AiHeroError::Precondition("cannot build path".into()))?
            .clear()
            .extend(segments);
        Ok(scratch.path().to_string())
    }
}
