use lookout_net::NetError;
use thiserror::Error;

/// A message the worker cannot act on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message has no method tag")]
    MissingMethod,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("malformed '{method}' message: {message}")]
    Malformed { method: String, message: String },

    /// Refers to a stream that is no longer the active one. Expected after
    /// a new stream supersedes an old one and never surfaced to the host.
    #[error("stream '{0}' is not the active stream")]
    StaleSession(String),
}

impl ProtocolError {
    /// Whether the worker must stop: host and worker disagree on the contract.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StaleSession(_))
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("failed to set up transport: {0}")]
    Net(#[from] NetError),

    #[error("worker is no longer running")]
    Closed,

    #[error("worker task failed: {0}")]
    Join(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
