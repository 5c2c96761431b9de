//! Transport contract for in-process event delivery.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{error::TransportError, event::PublishedEvent};

/// Receiving end of a transport subscription.
///
/// Every receiver observes every event published after it was created.
/// The stream ends (`RecvError::Closed`) once the transport is closed.
pub type EventReceiver = broadcast::Receiver<Arc<PublishedEvent>>;

/// Publish/subscribe delivery of events between the backend and observers.
pub trait Transport: Send + Sync + 'static {
    /// Makes the transport ready to carry events.
    fn open(&self) -> Result<(), TransportError>;

    /// Publishes `event` to all current receivers and returns how many
    /// receivers it reached.
    fn publish(&self, event: PublishedEvent) -> Result<usize, TransportError>;

    /// Creates a receiver for events published from now on.
    fn subscribe(&self) -> Result<EventReceiver, TransportError>;

    /// Closes the transport, ending every receiver's stream.
    fn close(&self);
}
