// Error taxonomy for the remote filesystem core.
//
// `FsError` is `Clone` because one reload result is handed to every caller
// that joined the in-flight reload.

use creatio_fs_common::path::PathError;
use thiserror::Error;

use crate::queue::QueueError;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Bad credentials, malformed session, or unauthorized twice in a row.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Unexpected status code or a body that is not valid JSON.
    #[error("protocol error (status {status:?}): {message}")]
    Protocol { status: Option<u16>, message: String },

    /// The server processed the request and reported failure.
    #[error("remote operation failed: {0}")]
    RemoteOperation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("inheritance chain of `{path}` exceeds {limit} ancestors or loops")]
    InheritanceCycle { path: String, limit: usize },

    /// Transient network failures that outlived the retry policy.
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("read-only: {0}")]
    ReadOnly(String),

    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FsError {
    pub fn protocol(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Protocol { status, message: message.into() }
    }

    pub fn cache(context: &str, error: impl std::fmt::Display) -> Self {
        Self::Cache(format!("{context}: {error}"))
    }

    /// Stable machine-readable code for hosts that report errors as data.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION",
            Self::Protocol { .. } => "PROTOCOL",
            Self::RemoteOperation(_) => "REMOTE_OPERATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InheritanceCycle { .. } => "INHERITANCE_CYCLE",
            Self::Transport { .. } => "TRANSPORT",
            Self::Cache(_) => "CACHE",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::ReadOnly(_) => "READ_ONLY",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Queue(QueueError::Superseded) => "SUPERSEDED",
            Self::Queue(QueueError::Aborted(_)) => "ABORTED",
            Self::Config(_) => "CONFIG",
        }
    }
}
