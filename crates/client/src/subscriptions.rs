use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hello_es_server::SubscriptionHandle;
use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

/// The active subscriptions of a client.
///
/// Clones share the same registry, so a subscription callback can hold one
/// and cancel its own subscription.
#[derive(Clone)]
pub struct Subscriptions {
    inner: Arc<Inner>,
}

struct Inner {
    active: Mutex<IndexMap<Uuid, SubscriptionHandle>>,
    count: watch::Sender<usize>,
}

impl Subscriptions {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Subscriptions {
            inner: Arc::new(Inner {
                active: Mutex::new(IndexMap::new()),
                count,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: &SubscriptionHandle) -> bool {
        self.active().contains_key(&handle.id())
    }

    pub(crate) fn add(&self, handle: SubscriptionHandle) {
        let mut active = self.active();
        active.insert(handle.id(), handle);
        self.inner.count.send_replace(active.len());
    }

    /// Cancels `handle` and removes it from the registry.
    ///
    /// Returns false if it was not registered. Cancelling twice is a no-op.
    pub fn cancel(&self, handle: &SubscriptionHandle) -> bool {
        let removed = {
            let mut active = self.active();
            let removed = active.shift_remove(&handle.id());
            self.inner.count.send_replace(active.len());
            removed
        };

        handle.cancel();
        removed.is_some()
    }

    /// Cancels every registered subscription, returning how many there were.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut active = self.active();
            let drained: Vec<_> = active.drain(..).map(|(_, handle)| handle).collect();
            self.inner.count.send_replace(0);
            drained
        };

        for handle in &drained {
            handle.cancel();
        }
        if !drained.is_empty() {
            debug!(subscriptions = drained.len(), "cancelled all subscriptions");
        }

        drained.len()
    }

    /// Waits until no subscription is registered.
    pub async fn wait_until_empty(&self, timeout: Duration) -> Result<(), ClientError> {
        let mut count = self.inner.count.subscribe();
        let emptied = tokio::time::timeout(timeout, async move {
            // The sender lives as long as `self`, so this cannot fail.
            let _ = count.wait_for(|count| *count == 0).await;
        })
        .await;

        emptied.map_err(|_| ClientError::Timeout(timeout))
    }

    fn active(&self) -> MutexGuard<'_, IndexMap<Uuid, SubscriptionHandle>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}
