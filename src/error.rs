use std::time::Duration;

use thiserror::Error;

/// Every failure the SDK can report.
///
/// Local precondition failures, remote HTTP statuses, unreachable servers,
/// failed remote jobs and poll deadlines are kept apart so callers can tell
/// "my call was malformed" from "the server said no" from "the network is down".
#[derive(Debug, Error)]
pub enum AiHeroError {
    /// Malformed call detected before any network I/O.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The server answered with a non-2xx status.
    #[error("<Response [{status}]> {message}")]
    RemoteStatus { status: u16, message: String },

    /// The request never produced an HTTP response (DNS, connect, socket timeout).
    #[error("network unreachable: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A polled job or workflow reported a terminal failure state.
    #[error("{message} (id {id}, state {state})")]
    RemoteJob {
        id: String,
        state: String,
        message: String,
    },

    /// The poll deadline elapsed while the resource was still running.
    #[error("timed out after {}ms waiting for {id} (last state: {})", .elapsed.as_millis(), .last_state.as_deref().unwrap_or("unknown"))]
    PollTimeout {
        id: String,
        elapsed: Duration,
        last_state: Option<String>,
    },

    #[error("polling {id} was cancelled")]
    Cancelled { id: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload-free discriminant of [`AiHeroError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    RemoteStatus,
    Transport,
    RemoteJob,
    PollTimeout,
    Cancelled,
    Decode,
    Schema,
    Config,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::RemoteStatus => "remote status",
            ErrorKind::Transport => "transport",
            ErrorKind::RemoteJob => "remote job",
            ErrorKind::PollTimeout => "poll timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Decode => "decode",
            ErrorKind::Schema => "schema",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

impl AiHeroError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiHeroError::Precondition(_) => ErrorKind::Precondition,
            AiHeroError::RemoteStatus { .. } => ErrorKind::RemoteStatus,
            AiHeroError::Transport { .. } => ErrorKind::Transport,
            AiHeroError::RemoteJob { .. } => ErrorKind::RemoteJob,
            AiHeroError::PollTimeout { .. } => ErrorKind::PollTimeout,
            AiHeroError::Cancelled { .. } => ErrorKind::Cancelled,
            AiHeroError::Decode(_) => ErrorKind::Decode,
            AiHeroError::Schema(_) => ErrorKind::Schema,
            AiHeroError::Config(_) => ErrorKind::Config,
            AiHeroError::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AiHeroError::RemoteStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the poller may retry this error under a transient-retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, AiHeroError::Transport { .. })
    }

    pub(crate) fn transport(message: impl Into<String>, source: reqwest::Error) -> Self {
        AiHeroError::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Prefix the message with facade context. The kind never changes.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            AiHeroError::Precondition(msg) => AiHeroError::Precondition(format!("{context}: {msg}")),
            AiHeroError::RemoteStatus { status, message } => AiHeroError::RemoteStatus {
                status,
                message: format!("{context}: {message}"),
            },
            AiHeroError::Transport { message, source } => AiHeroError::Transport {
                message: format!("{context}: {message}"),
                source,
            },
            AiHeroError::RemoteJob { id, state, message } => AiHeroError::RemoteJob {
                id,
                state,
                message: format!("{context}: {message}"),
            },
            AiHeroError::Schema(msg) => AiHeroError::Schema(format!("{context}: {msg}")),
            AiHeroError::Config(msg) => AiHeroError::Config(format!("{context}: {msg}")),
            other => other,
        }
    }
}

pub type Result<T, E = AiHeroError> = std::result::Result<T, E>;
