use std::sync::{Arc, PoisonError, RwLock};

use hello_es_sdk::{
    error::TransportError,
    event::PublishedEvent,
    transport::{EventReceiver, Transport},
};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Number of events a slow receiver may fall behind before it starts
/// missing events.
pub const DEFAULT_TRANSPORT_CAPACITY: usize = 1024;

/// Broadcast-channel transport living inside the process.
///
/// The transport starts closed; [`Transport::open`] creates the channel and
/// [`Transport::close`] drops it, which ends every receiver's stream once it
/// has drained the events already queued.
#[derive(Debug)]
pub struct InMemoryTransport {
    capacity: usize,
    sender: RwLock<Option<broadcast::Sender<Arc<PublishedEvent>>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRANSPORT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        InMemoryTransport {
            capacity: capacity.max(1),
            sender: RwLock::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn sender(&self) -> Result<broadcast::Sender<Arc<PublishedEvent>>, TransportError> {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryTransport {
    fn open(&self) -> Result<(), TransportError> {
        let mut sender = self.sender.write().unwrap_or_else(PoisonError::into_inner);
        if sender.is_none() {
            let (tx, _) = broadcast::channel(self.capacity);
            *sender = Some(tx);
            debug!(capacity = self.capacity, "transport opened");
        }

        Ok(())
    }

    fn publish(&self, event: PublishedEvent) -> Result<usize, TransportError> {
        let sender = self.sender()?;
        let event_type = event.event_type.clone();
        // No receivers is not a failure, the event just reaches nobody.
        let receivers = sender.send(Arc::new(event)).unwrap_or(0);
        trace!(%event_type, receivers, "event published");

        Ok(receivers)
    }

    fn subscribe(&self) -> Result<EventReceiver, TransportError> {
        Ok(self.sender()?.subscribe())
    }

    fn close(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!("transport closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;
    use uuid::Uuid;

    use super::*;

    fn event(event_type: &str) -> PublishedEvent {
        PublishedEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            tags: vec!["username:alice".to_string()],
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            data: json!({ "username": "alice" }),
        }
    }

    #[test]
    fn closed_transport_rejects_publish_and_subscribe() {
        let transport = InMemoryTransport::new();

        assert_eq!(transport.publish(event("Printed")), Err(TransportError::Closed));
        assert!(matches!(transport.subscribe(), Err(TransportError::Closed)));
    }

    #[test]
    fn publish_without_receivers_reaches_nobody() {
        let transport = InMemoryTransport::new();
        transport.open().unwrap();

        assert_eq!(transport.publish(event("Printed")), Ok(0));
    }

    #[tokio::test]
    async fn every_receiver_sees_every_event() {
        let transport = InMemoryTransport::with_capacity(8);
        transport.open().unwrap();
        let mut first = transport.subscribe().unwrap();
        let mut second = transport.subscribe().unwrap();

        assert_eq!(transport.publish(event("Printed")), Ok(2));

        assert_eq!(first.recv().await.unwrap().event_type, "Printed");
        assert_eq!(second.recv().await.unwrap().event_type, "Printed");
    }

    #[tokio::test]
    async fn close_ends_receiver_streams() {
        let transport = InMemoryTransport::new();
        transport.open().unwrap();
        let mut receiver = transport.subscribe().unwrap();
        transport.publish(event("Printed")).unwrap();

        transport.close();

        assert!(receiver.recv().await.is_ok());
        assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
        assert!(!transport.is_open());
    }

    #[test]
    fn reopening_is_idempotent() {
        let transport = InMemoryTransport::new();
        transport.open().unwrap();
        let _receiver = transport.subscribe().unwrap();

        transport.open().unwrap();

        assert_eq!(transport.publish(event("Printed")), Ok(1));
    }
}
