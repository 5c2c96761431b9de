use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{command::CommandEnvelope, domain_id::DomainIdValues, error::SerializationError};

/// Causal metadata attached to every event emitted for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Uuid,
}

impl EventEnvelope {
    /// Metadata for events caused by `command`.
    pub fn caused_by(command: &CommandEnvelope) -> Self {
        EventEnvelope {
            timestamp: Utc::now(),
            correlation_id: command.id,
            causation_id: command.id,
        }
    }
}

/// An event as it travels over a [`Transport`](crate::transport::Transport).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub id: Uuid,
    pub event_type: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Uuid,
    pub data: Value,
}

impl PublishedEvent {
    /// Returns true if this event carries the payload of `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.event_type == E::EVENT_TYPE
    }

    /// Deserializes the payload into `E`.
    ///
    /// Returns `None` if the event type does not match, or `Some(Err(...))`
    /// if the payload cannot be deserialized.
    pub fn decode<E: Event>(&self) -> Option<Result<E, SerializationError>> {
        if !self.is::<E>() {
            return None;
        }

        Some(serde_json::from_value(self.data.clone()).map_err(SerializationError::from))
    }
}

/// Trait for individual event structs.
///
/// Each event knows its type name and which fields are domain identifiers.
/// Domain IDs identify which entity an event belongs to; they become the
/// `category:id` tags of the published event.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Event, Clone, Serialize, Deserialize)]
/// #[event_type("Printed")]
/// pub struct Printed {
///     #[domain_id]
///     pub username: String,
///     pub text: String,
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + Send + Sized + 'static {
    /// The event type name as it appears on the transport.
    const EVENT_TYPE: &'static str;
    /// The domain id fields.
    const DOMAIN_ID_FIELDS: &'static [&'static str];

    /// Returns the domain ID field names and their values for this event instance.
    fn domain_ids(&self) -> DomainIdValues;
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::Event;

    #[derive(Clone, Debug, PartialEq, Event, Serialize, Deserialize)]
    #[event_type("Greeted")]
    struct Greeted {
        #[domain_id]
        username: String,
        greeting: String,
    }

    #[derive(Clone, Debug, PartialEq, Event, Serialize, Deserialize)]
    struct Waved {
        #[domain_id("username")]
        who: String,
    }

    fn published(event_type: &str, data: Value) -> PublishedEvent {
        PublishedEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            tags: Vec::new(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            data,
        }
    }

    #[test]
    fn derive_uses_attribute_or_struct_name() {
        assert_eq!(Greeted::EVENT_TYPE, "Greeted");
        assert_eq!(Greeted::DOMAIN_ID_FIELDS, &["username"]);
        assert_eq!(Waved::EVENT_TYPE, "Waved");
        assert_eq!(Waved::DOMAIN_ID_FIELDS, &["username"]);
    }

    #[test]
    fn decode_matches_event_type() {
        let event = published(
            "Greeted",
            serde_json::json!({ "username": "alice", "greeting": "hi" }),
        );

        let greeted = event.decode::<Greeted>().unwrap().unwrap();
        assert_eq!(greeted.username, "alice");
        assert!(event.decode::<Waved>().is_none());
    }

    #[test]
    fn decode_reports_malformed_payload() {
        let event = published("Greeted", serde_json::json!({ "username": 7 }));
        assert!(event.decode::<Greeted>().unwrap().is_err());
    }
}
