use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use hello_es_sdk::storage::StateKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per state key.
///
/// Commands for the same key run one after another; commands for different
/// keys run concurrently. Locks nobody holds or waits on are pruned on the
/// next acquisition.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<StateKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &StateKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
