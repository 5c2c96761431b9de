//! Typed event subscriptions.
//!
//! Each subscription owns a transport receiver and a delivery task. The task
//! decodes events of one type and hands them to the subscriber's callback,
//! one at a time, until the subscription is cancelled or the transport
//! closes.

use std::{fmt, sync::Arc};

use hello_es_sdk::{
    event::{Event, PublishedEvent},
    transport::EventReceiver,
};
use tokio::{
    runtime::Handle,
    sync::{broadcast::error::RecvError, watch},
};
use tracing::{Instrument, debug, debug_span, trace, warn};
use uuid::Uuid;

/// Narrows a subscription to some of the events of its type.
///
/// The default filter lets every event through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    correlation_id: Option<Uuid>,
    tag: Option<String>,
}

impl EventFilter {
    /// Only events caused by the command with id `command_id`.
    pub fn caused_by(command_id: Uuid) -> Self {
        EventFilter {
            correlation_id: Some(command_id),
            tag: None,
        }
    }

    /// Only events carrying the `category:id` tag.
    pub fn tagged(mut self, category: &str, id: &str) -> Self {
        self.tag = Some(format!("{category}:{id}"));
        self
    }

    pub fn matches(&self, event: &PublishedEvent) -> bool {
        if self
            .correlation_id
            .is_some_and(|correlation_id| event.correlation_id != correlation_id)
        {
            return false;
        }

        match &self.tag {
            Some(tag) => event.tags.iter().any(|event_tag| event_tag == tag),
            None => true,
        }
    }
}

/// Handle to an active subscription.
///
/// Clones share the same subscription. Dropping every clone cancels it.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    event_type: &'static str,
    cancel: watch::Sender<bool>,
    done: watch::Receiver<()>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The event type this subscription observes.
    pub fn event_type(&self) -> &'static str {
        self.inner.event_type
    }

    /// Cancels the subscription.
    ///
    /// Idempotent: returns true only for the call that actually cancelled
    /// it. A callback already running is not interrupted, but no further
    /// events are delivered.
    pub fn cancel(&self) -> bool {
        let was_cancelled = self.inner.cancel.send_replace(true);
        if !was_cancelled {
            debug!(subscription = %self.inner.id, "subscription cancelled");
        }
        !was_cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// True once the delivery task has ended.
    pub fn is_stopped(&self) -> bool {
        self.inner.done.has_changed().is_err()
    }

    /// Waits until the delivery task has ended.
    pub async fn stopped(&self) {
        let mut done = self.inner.done.clone();
        // Only resolves with an error, once the task drops its sender.
        while done.changed().await.is_ok() {}
    }
}

impl PartialEq for SubscriptionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for SubscriptionHandle {}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.inner.id)
            .field("event_type", &self.inner.event_type)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Starts delivering events of type `E` that pass `filter` from `receiver`
/// to `callback`.
pub(crate) fn spawn<E, F>(
    runtime: &Handle,
    receiver: EventReceiver,
    filter: EventFilter,
    callback: F,
) -> SubscriptionHandle
where
    E: Event,
    F: FnMut(E) + Send + 'static,
{
    let id = Uuid::new_v4();
    let (cancel, cancelled) = watch::channel(false);
    let (done_tx, done) = watch::channel(());

    let span = debug_span!("subscription", subscription = %id, event_type = E::EVENT_TYPE);
    runtime.spawn(
        async move {
            deliver::<E, F>(receiver, filter, cancelled, callback).await;
            drop(done_tx);
        }
        .instrument(span),
    );

    SubscriptionHandle {
        inner: Arc::new(Inner {
            id,
            event_type: E::EVENT_TYPE,
            cancel,
            done,
        }),
    }
}

async fn deliver<E, F>(
    mut receiver: EventReceiver,
    filter: EventFilter,
    mut cancelled: watch::Receiver<bool>,
    mut callback: F,
) where
    E: Event,
    F: FnMut(E),
{
    loop {
        let received = tokio::select! {
            biased;
            () = cancellation(&mut cancelled) => break,
            received = receiver.recv() => received,
        };

        match received {
            Ok(event) if !filter.matches(&event) => {
                trace!(event_id = %event.id, tags = ?event.tags, "event filtered out");
            }
            Ok(event) => match event.decode::<E>() {
                Some(Ok(decoded)) => callback(decoded),
                Some(Err(err)) => {
                    warn!(event_id = %event.id, "skipping undecodable event: {err}");
                }
                None => {}
            },
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "subscriber fell behind, events were dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    debug!("subscription ended");
}

/// Resolves once the subscription is cancelled or every handle is dropped.
async fn cancellation(cancelled: &mut watch::Receiver<bool>) {
    let _ = cancelled.wait_for(|cancelled| *cancelled).await;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn published(correlation_id: Uuid, tags: &[&str]) -> PublishedEvent {
        PublishedEvent {
            id: Uuid::new_v4(),
            event_type: "Printed".to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            timestamp: Utc::now(),
            correlation_id,
            causation_id: correlation_id,
            data: json!({}),
        }
    }

    #[test]
    fn default_filter_matches_everything() {
        assert!(EventFilter::default().matches(&published(Uuid::new_v4(), &[])));
    }

    #[test]
    fn caused_by_matches_the_command_only() {
        let command_id = Uuid::new_v4();
        let filter = EventFilter::caused_by(command_id);

        assert!(filter.matches(&published(command_id, &["username:alice"])));
        assert!(!filter.matches(&published(Uuid::new_v4(), &["username:alice"])));
    }

    #[test]
    fn tagged_requires_the_tag() {
        let command_id = Uuid::new_v4();
        let filter = EventFilter::caused_by(command_id).tagged("username", "alice");

        assert!(filter.matches(&published(command_id, &["username:alice"])));
        assert!(!filter.matches(&published(command_id, &["username:bob"])));
        assert!(!filter.matches(&published(Uuid::new_v4(), &["username:alice"])));
    }
}
