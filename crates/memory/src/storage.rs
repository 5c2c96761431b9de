use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use hello_es_sdk::{
    error::StorageError,
    storage::{StateKey, StateStore, StoredState},
};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

/// Keyed states held in a map, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    states: Mutex<IndexMap<StateKey, StoredState>>,
    closed: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored states.
    pub fn len(&self) -> usize {
        self.states().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states().is_empty()
    }

    /// Keys of all stored states, in the order they were first saved.
    pub fn keys(&self) -> Vec<StateKey> {
        self.states().keys().cloned().collect()
    }

    fn states(&self) -> MutexGuard<'_, IndexMap<StateKey, StoredState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }

        Ok(())
    }
}

impl StateStore for InMemoryStorage {
    fn open(&self) -> Result<(), StorageError> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn load(&self, key: &StateKey) -> Result<Option<StoredState>, StorageError> {
        self.ensure_open()?;
        Ok(self.states().get(key).cloned())
    }

    fn save(
        &self,
        key: &StateKey,
        expected_version: Option<u64>,
        data: Value,
    ) -> Result<u64, StorageError> {
        self.ensure_open()?;

        let mut states = self.states();
        let actual = states.get(key).map(|state| state.version);
        if actual != expected_version {
            return Err(StorageError::Conflict {
                key: key.clone(),
                expected: expected_version,
                actual,
            });
        }

        let version = actual.map_or(1, |version| version + 1);
        states.insert(
            key.clone(),
            StoredState {
                version,
                updated_at: Utc::now(),
                data,
            },
        );
        trace!(state_key = %key, version, "state saved");

        Ok(version)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
