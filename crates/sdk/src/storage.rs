//! Storage contract for keyed handler state.
//!
//! The backend never touches a concrete store; it is handed an
//! `Arc<dyn StateStore>` at construction. States are stored as JSON values
//! with a version that increases by one on every committed mutation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// Identifies one keyed state: the handler's state type plus the domain id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub state_type: String,
    pub id: String,
}

impl StateKey {
    pub fn new(state_type: impl Into<String>, id: impl Into<String>) -> Self {
        StateKey {
            state_type: state_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.state_type, self.id)
    }
}

/// A committed state snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub data: Value,
}

/// Keyed state storage.
///
/// Implementations must be safe to share between tasks. Per-key
/// serialization is the caller's job; `save` only guards against stale
/// writes through its expected version.
pub trait StateStore: Send + Sync + 'static {
    /// Acquires whatever the store needs before serving requests.
    fn open(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Loads the committed state for `key`, if any.
    fn load(&self, key: &StateKey) -> Result<Option<StoredState>, StorageError>;

    /// Commits `data` for `key` and returns the new version.
    ///
    /// `expected_version` is the version the caller loaded (`None` when the
    /// state did not exist). A mismatch fails with
    /// [`StorageError::Conflict`] and leaves the stored state untouched.
    fn save(
        &self,
        key: &StateKey,
        expected_version: Option<u64>,
        data: Value,
    ) -> Result<u64, StorageError>;

    /// Releases the store. Further loads and saves fail with
    /// [`StorageError::Closed`].
    fn close(&self) {}
}
