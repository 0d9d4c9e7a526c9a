use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::PollPhase;

/// Retry policy for transport failures during a poll tick.
///
/// `max_retries = 0` means a network error on any tick aborts the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive transport failures tolerated before giving up.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// What one poll loop observed, kept for logs and the CLI summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollRecord {
    pub id: String,
    /// Successful fetches.
    pub attempts: u32,
    /// Transport failures that were retried.
    pub retries: u32,
    pub history: Vec<PollPhase>,
    pub last_state: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PollRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attempts: 0,
            retries: 0,
            history: Vec::new(),
            last_state: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn default_retry_is_fail_fast() {
        assert_eq!(RetryConfig::default().max_retries, 0);
    }

    #[test]
    fn record_defaults() {
        let record = PollRecord::new("j1");
        assert_eq!(record.id, "j1");
        assert_eq!(record.attempts, 0);
        assert!(record.history.is_empty());
        assert!(record.finished_at.is_none());
        assert!(record.duration_ms() >= 0);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let mut record = PollRecord::new("wf-1");
        record.history.push(PollPhase::Pending);
        record.last_state = Some("running".into());
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PollRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "wf-1");
        assert_eq!(parsed.history, vec![PollPhase::Pending]);
        assert_eq!(parsed.last_state.as_deref(), Some("running"));
    }
}
