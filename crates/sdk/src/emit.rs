use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain_id::{DomainIdValues, into_tags},
    error::SerializationError,
    event::{Event, EventEnvelope, PublishedEvent},
};

/// A collection of events to be emitted by a command.
///
/// Built using the builder pattern:
///
/// ```rust,ignore
/// Ok((self, Emit::new().event(Printed { ... })))
/// ```
#[derive(Debug, Default)]
pub struct Emit {
    events: Vec<EmittedEvent>,
}

/// A serialized event ready for publishing.
#[derive(Debug)]
pub struct EmittedEvent {
    /// The event type name
    pub event_type: String,
    /// The serialized event data (JSON)
    pub data: Value,
    /// Domain ID values for tagging
    pub domain_ids: DomainIdValues,
}

impl Emit {
    /// Create a new empty emit collection.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to be emitted.
    ///
    /// # Panics
    ///
    /// Panics if the event cannot be serialized. In practice this
    /// shouldn't happen with well-formed event structs.
    pub fn event<E: Event>(mut self, event: E) -> Self {
        let event = EmittedEvent::try_new(event).expect("event serialization failed");
        self.events.push(event);
        self
    }

    /// Returns true if no events will be emitted.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events to be emitted.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Consume and return the collected events.
    pub fn into_events(self) -> Vec<EmittedEvent> {
        self.events
    }
}

impl EmittedEvent {
    pub fn try_new<E: Event>(event: E) -> Result<Self, SerializationError> {
        let domain_ids = event.domain_ids();
        Ok(EmittedEvent {
            event_type: E::EVENT_TYPE.to_string(),
            data: serde_json::to_value(event)?,
            domain_ids,
        })
    }

    /// Stamps the event with an id and its causal metadata.
    pub fn into_published(self, envelope: EventEnvelope) -> PublishedEvent {
        PublishedEvent {
            id: Uuid::new_v4(),
            event_type: self.event_type,
            tags: into_tags(self.domain_ids),
            timestamp: envelope.timestamp,
            correlation_id: envelope.correlation_id,
            causation_id: envelope.causation_id,
            data: self.data,
        }
    }
}
