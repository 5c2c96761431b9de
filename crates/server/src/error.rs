use std::fmt;

use hello_es_sdk::error::{
    CommandError, ErrorCode, ExecuteError, SerializationError, StorageError, TransportError,
};
use thiserror::Error;

/// Error returned when a command or subscription cannot be served.
#[derive(Clone, Debug, Error)]
pub enum SubmitError {
    /// No handler is registered for the command type.
    #[error("no handler registered for command type `{0}`")]
    Routing(String),

    /// The handler rejected or failed the command.
    #[error(transparent)]
    Handler(CommandError),

    /// The server is not between `start` and `shutdown`.
    #[error("server `{0}` is not running")]
    NotRunning(String),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Coarse classification of a [`SubmitError`], used in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// Client sent invalid/malformed input
    InvalidInput,

    /// No handler for the command
    NotFound,

    /// Request conflicts with current state
    Conflict,

    /// Valid request but business rules rejected it
    Rejected,

    /// Server-side error
    Internal,

    /// Server or collaborator not available
    Unavailable,
}

impl ErrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::InvalidInput => "invalid_input",
            ErrorStatus::NotFound => "not_found",
            ErrorStatus::Conflict => "conflict",
            ErrorStatus::Rejected => "rejected",
            ErrorStatus::Internal => "internal",
            ErrorStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SubmitError {
    pub fn status(&self) -> ErrorStatus {
        match self {
            SubmitError::Routing(_) => ErrorStatus::NotFound,
            SubmitError::Handler(err) => match err.code {
                ErrorCode::Rejected => ErrorStatus::Rejected,
                ErrorCode::InvalidInput => ErrorStatus::InvalidInput,
                ErrorCode::Internal => ErrorStatus::Internal,
            },
            SubmitError::NotRunning(_) => ErrorStatus::Unavailable,
            SubmitError::Serialization(_) => ErrorStatus::InvalidInput,
            SubmitError::Storage(StorageError::Conflict { .. }) => ErrorStatus::Conflict,
            SubmitError::Storage(StorageError::Closed) => ErrorStatus::Unavailable,
            SubmitError::Transport(TransportError::Closed) => ErrorStatus::Unavailable,
        }
    }
}

impl From<CommandError> for SubmitError {
    fn from(err: CommandError) -> Self {
        SubmitError::Handler(err)
    }
}

impl From<ExecuteError> for SubmitError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Command(err) => SubmitError::Handler(err),
            ExecuteError::Storage(err) => SubmitError::Storage(err),
            ExecuteError::Serialization(err) => SubmitError::Serialization(err),
        }
    }
}

/// Error returned when a server fails to start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("server `{0}` is already running")]
    AlreadyRunning(String),

    #[error("server `{name}` must be started inside a tokio runtime")]
    NoRuntime {
        name: String,
        #[source]
        source: tokio::runtime::TryCurrentError,
    },

    #[error("failed to open state storage: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to open transport: {0}")]
    Transport(#[from] TransportError),
}
