use std::time::Duration;

use hello_es_sdk::error::SerializationError;
use hello_es_server::SubmitError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("failed to serialize command input: {0}")]
    Serialization(#[from] SerializationError),

    /// Subscriptions were still active when the wait timed out.
    #[error("subscriptions still active after {0:?}")]
    Timeout(Duration),

    #[error("client is closed")]
    Closed,
}
