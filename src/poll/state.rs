use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::PollRecord;

/// Bucket a remote state token falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollPhase {
    /// Non-terminal state reported by the server.
    Pending,
    /// Terminal success.
    Done,
    /// Terminal failure.
    Error,
    /// Response had no state field at all.
    Unknown,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollPhase::Pending => write!(f, "PENDING"),
            PollPhase::Done => write!(f, "DONE"),
            PollPhase::Error => write!(f, "ERROR"),
            PollPhase::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Allow-list of terminal tokens for one kind of remote resource.
///
/// Jobs and workflows use different words on the server and are kept as two
/// separate vocabularies. Anything not on either list keeps the poll going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateVocabulary {
    pub resource: &'static str,
    pub done: &'static [&'static str],
    pub failed: &'static [&'static str],
}

impl StateVocabulary {
    /// Automation jobs: `created` / `continue` while running.
    pub const JOB: StateVocabulary = StateVocabulary {
        resource: "job",
        done: &["done"],
        failed: &["error"],
    };

    /// Workflows: `pending` / `running` while running.
    pub const WORKFLOW: StateVocabulary = StateVocabulary {
        resource: "workflow",
        done: &["success"],
        failed: &["failed", "aborted"],
    };

    pub fn classify(&self, token: Option<&str>) -> PollPhase {
        match token {
            None => PollPhase::Unknown,
            Some(t) if self.done.contains(&t) => PollPhase::Done,
            Some(t) if self.failed.contains(&t) => PollPhase::Error,
            Some(_) => PollPhase::Pending,
        }
    }
}

/// What the poll loop does after one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Not terminal yet: sleep and fetch again.
    Continue,
    /// Terminal success.
    Finished,
    /// Terminal failure carrying the raw state token.
    Failed { state: String },
}

/// Folds each observed phase into the poll record.
pub struct PollStateMachine;

impl PollStateMachine {
    /// `Unknown` and `Pending` both continue; only allow-listed tokens stop the loop.
    pub fn next(record: &mut PollRecord, phase: PollPhase, token: Option<&str>) -> Transition {
        record.attempts += 1;
        record.history.push(phase);
        if let Some(token) = token {
            record.last_state = Some(token.to_string());
        }

        match phase {
            PollPhase::Pending | PollPhase::Unknown => Transition::Continue,
            PollPhase::Done => {
                record.finish();
                Transition::Finished
            }
            PollPhase::Error => {
                record.finish();
                Transition::Failed {
                    state: token.unwrap_or("error").to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_vocabulary() {
        let v = StateVocabulary::JOB;
        assert_eq!(v.classify(Some("created")), PollPhase::Pending);
        assert_eq!(v.classify(Some("continue")), PollPhase::Pending);
        assert_eq!(v.classify(Some("done")), PollPhase::Done);
        assert_eq!(v.classify(Some("error")), PollPhase::Error);
        assert_eq!(v.classify(Some("reticulating")), PollPhase::Pending);
        assert_eq!(v.classify(None), PollPhase::Unknown);
        // Workflow words mean nothing to jobs.
        assert_eq!(v.classify(Some("success")), PollPhase::Pending);
        assert_eq!(v.classify(Some("failed")), PollPhase::Pending);
    }

    #[test]
    fn workflow_vocabulary() {
        let v = StateVocabulary::WORKFLOW;
        assert_eq!(v.classify(Some("pending")), PollPhase::Pending);
        assert_eq!(v.classify(Some("running")), PollPhase::Pending);
        assert_eq!(v.classify(Some("success")), PollPhase::Done);
        assert_eq!(v.classify(Some("failed")), PollPhase::Error);
        assert_eq!(v.classify(Some("aborted")), PollPhase::Error);
        assert_eq!(v.classify(Some("done")), PollPhase::Pending);
    }

    #[test]
    fn pending_then_done_records_history() {
        let mut record = PollRecord::new("j1");
        assert_eq!(
            PollStateMachine::next(&mut record, PollPhase::Pending, Some("created")),
            Transition::Continue
        );
        assert_eq!(
            PollStateMachine::next(&mut record, PollPhase::Unknown, None),
            Transition::Continue
        );
        assert_eq!(
            PollStateMachine::next(&mut record, PollPhase::Done, Some("done")),
            Transition::Finished
        );
        assert_eq!(record.attempts, 3);
        assert_eq!(
            record.history,
            vec![PollPhase::Pending, PollPhase::Unknown, PollPhase::Done]
        );
        assert_eq!(record.last_state.as_deref(), Some("done"));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn error_carries_raw_token() {
        let mut record = PollRecord::new("wf");
        let t = PollStateMachine::next(&mut record, PollPhase::Error, Some("aborted"));
        assert_eq!(
            t,
            Transition::Failed {
                state: "aborted".into()
            }
        );
    }

    #[test]
    fn phase_display() {
        assert_eq!(PollPhase::Pending.to_string(), "PENDING");
        assert_eq!(PollPhase::Done.to_string(), "DONE");
        assert_eq!(PollPhase::Error.to_string(), "ERROR");
        assert_eq!(PollPhase::Unknown.to_string(), "UNKNOWN");
    }
}
