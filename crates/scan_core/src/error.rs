use std::fmt;

use thiserror::Error;

/// Failure reported by one of the remote services (executor or history).
///
/// Carried inside `Msg` results, so it stays cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
        }
    }
}

/// Why a submission was refused before any record was created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("subject label is empty")]
    EmptySubject,
    #[error("not a scannable url {label:?}: {reason}")]
    InvalidUrl { label: String, reason: String },
}
