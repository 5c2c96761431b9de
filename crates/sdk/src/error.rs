use thiserror::Error;

use crate::storage::StateKey;

/// Error returned when a command is rejected or fails.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    /// The error classification
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

/// Classification of command errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ErrorCode {
    /// Business rule violation - the command was understood but rejected.
    #[error("rejected")]
    Rejected,

    /// The input was malformed or invalid.
    /// Example: "domain id `username` must not be empty"
    #[error("invalid_input")]
    InvalidInput,

    /// An unexpected error occurred in the handler.
    #[error("internal")]
    Internal,
}

impl CommandError {
    /// Create a rejection error for business rule violations.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Rejected,
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }
}

/// Error returned when applying a command to its keyed state fails.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Error raised by a [`StateStore`](crate::storage::StateStore).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The stored version did not match the expected one.
    #[error("state `{key}` was modified concurrently (expected version {expected:?}, found {actual:?})")]
    Conflict {
        key: StateKey,
        expected: Option<u64>,
        actual: Option<u64>,
    },
    /// The store is not open.
    #[error("state store is closed")]
    Closed,
}

/// Error raised by a [`Transport`](crate::transport::Transport).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
}

/// Error during event serialization/deserialization.
#[derive(Clone, Debug, Error)]
#[error("(de)serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
