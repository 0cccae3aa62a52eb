use std::io;
use std::time::Duration;

use reqwest::StatusCode;
use responses_login::AuthError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResponsesErr>;

/// Raised by [`Conversation::append`](crate::Conversation::append). These
/// are agent-loop bugs and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("tool result references unknown call_id `{call_id}`")]
    UnknownCallId { call_id: String },

    #[error("tool call id `{call_id}` is already in use")]
    DuplicateCallId { call_id: String },

    #[error("system messages must precede every other turn")]
    SystemMessageAfterDialogue,
}

/// Cross-item rule broken by a draft input sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationViolation {
    #[error("tool output `{call_id}` has no preceding tool call in the same request")]
    OrphanToolResult { call_id: String },

    #[error("reasoning item `{id}` would be the last input item")]
    TrailingReasoning { id: String },

    #[error("call_id `{call_id}` is used by both `{first}` and `{second}`")]
    ConflictingToolName {
        call_id: String,
        first: String,
        second: String,
    },
}

/// Caller bugs detected while building a request. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("conversation produced no input items")]
    EmptyInput,

    #[error("correlation check failed: {0}")]
    CorrelationViolation(#[from] CorrelationViolation),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The backend refused the exact payload shape. Retrying the identical
    /// request cannot succeed; the profile needs correcting.
    #[error("backend rejected request ({status}): {detail}")]
    RequestRejected { status: StatusCode, detail: String },
}

/// Network failure, 408, 429 or 5xx. Eligible for bounded retry.
#[derive(Debug)]
pub struct TransientError {
    pub status: Option<StatusCode>,
    /// Delay requested by the server via `Retry-After`.
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl std::fmt::Display for TransientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "transient failure ({status}): {}", self.message),
            None => write!(f, "transient failure: {}", self.message),
        }
    }
}

impl std::error::Error for TransientError {}

#[derive(Error, Debug)]
pub enum ResponsesErr {
    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transient(#[from] TransientError),

    /// Any other non-success status.
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    #[error("unknown variant profile `{0}`")]
    UnknownProfile(String),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    // -----------------------------------------------------------------
    // Automatic conversions for common external error types
    // -----------------------------------------------------------------
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Client-side reqwest failure (builder, body decoding). Connect and
    /// timeout failures are reported as [`ResponsesErr::Transient`] instead.
    #[error(transparent)]
    Reqwest(reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl From<reqwest::Error> for ResponsesErr {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            ResponsesErr::Transient(TransientError {
                status: err.status(),
                retry_after: None,
                message: err.to_string(),
            })
        } else {
            ResponsesErr::Reqwest(err)
        }
    }
}

impl ResponsesErr {
    /// Only transient failures may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResponsesErr::Transient(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ResponsesErr::Transient(err) => err.retry_after,
            _ => None,
        }
    }
}
