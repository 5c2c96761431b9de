use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{
    domain_id::{DomainIdBindings, single_id},
    emit::{Emit, EmittedEvent},
    error::{CommandError, ExecuteError, SerializationError},
    storage::{StateKey, StateStore},
};

/// Trait for command input structs.
///
/// The command type routes the input to its handler. Fields annotated with
/// `#[domain_id]` name the keyed state the command addresses.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(CommandInput, Serialize, Deserialize)]
/// #[command_type("Print")]
/// struct Print {
///     #[domain_id]
///     username: String,
///     text: String,
/// }
/// ```
pub trait CommandInput: Serialize + DeserializeOwned + Send + 'static {
    /// The command type name used for routing.
    const COMMAND_TYPE: &'static str;

    /// Returns the domain ID bindings for this input.
    ///
    /// Maps domain ID field names to the values to address.
    fn domain_id_bindings(&self) -> DomainIdBindings;
}

/// Who a command is posted on behalf of.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// An anonymous client.
    #[default]
    Guest,
    /// A named user.
    User(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Guest => write!(f, "guest"),
            Actor::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// A command as it is submitted to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: Uuid,
    pub command_type: String,
    pub actor: Actor,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl CommandEnvelope {
    pub fn new<I: CommandInput>(input: &I, actor: Actor) -> Result<Self, SerializationError> {
        Ok(CommandEnvelope {
            id: Uuid::new_v4(),
            command_type: I::COMMAND_TYPE.to_string(),
            actor,
            timestamp: Utc::now(),
            data: serde_json::to_value(input)?,
        })
    }

    /// Deserializes the payload into the input type it was routed to.
    pub fn decode<I: CommandInput>(&self) -> Result<I, SerializationError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// The main trait for implementing command handlers.
///
/// The implementing type is the handler's state, one instance per domain id.
/// Handling is a pure reducer: it takes the current state and the input, and
/// returns the next state together with the events to publish. The runtime
/// commits the next state only if `handle` succeeds, so a rejected command
/// never leaves a partial change behind.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default, Serialize, Deserialize)]
/// struct Console {
///     lines: Vec<String>,
/// }
///
/// impl Command for Console {
///     const STATE_TYPE: &'static str = "Console";
///     type Input = Print;
///
///     fn handle(mut self, input: Print) -> Result<(Self, Emit), CommandError> {
///         self.lines.push(input.text.clone());
///         Ok((self, emit![Printed {
///             username: input.username,
///             text: input.text,
///         }]))
///     }
/// }
/// ```
pub trait Command: Default + Serialize + DeserializeOwned + Send + 'static {
    /// Name of the state type as it appears in the state store.
    const STATE_TYPE: &'static str;

    /// The input type for this command.
    type Input: CommandInput;

    /// The id of the state this input addresses.
    ///
    /// Defaults to the single domain id bound by the input.
    fn state_id(input: &Self::Input) -> Result<String, CommandError> {
        single_id(input.domain_id_bindings())
    }

    /// Handle the command, producing the next state and new events.
    ///
    /// Takes `self` by value since the current state is replaced.
    fn handle(self, input: Self::Input) -> Result<(Self, Emit), CommandError>;

    /// The storage key of the state this input addresses.
    fn state_key(input: &Self::Input) -> Result<StateKey, CommandError> {
        Ok(StateKey::new(Self::STATE_TYPE, Self::state_id(input)?))
    }

    /// Loads the committed state for `key` and its version.
    ///
    /// A missing state yields `Default` with no version.
    fn load(store: &dyn StateStore, key: &StateKey) -> Result<(Option<u64>, Self), ExecuteError> {
        match store.load(key)? {
            Some(stored) => {
                let state = serde_json::from_value(stored.data).map_err(SerializationError::from)?;
                Ok((Some(stored.version), state))
            }
            None => Ok((None, Self::default())),
        }
    }

    /// Execute the command against the state stored under `key`.
    ///
    /// Callers must serialize executions for the same key and pass the key
    /// obtained from [`Command::state_key`] for this input.
    fn execute(
        store: &dyn StateStore,
        key: &StateKey,
        input: Self::Input,
    ) -> Result<ExecuteResult, ExecuteError> {
        let (expected_version, state) = Self::load(store, key)?;
        let (state, emit) = state.handle(input)?;

        let data = serde_json::to_value(&state).map_err(SerializationError::from)?;
        let version = store.save(key, expected_version, data)?;

        debug!(state_key = %key, version, events = emit.len(), "state committed");

        Ok(ExecuteResult {
            key: key.clone(),
            version,
            events: emit.into_events(),
        })
    }
}

/// Outcome of a committed command.
#[derive(Debug)]
pub struct ExecuteResult {
    pub key: StateKey,
    pub version: u64,
    pub events: Vec<EmittedEvent>,
}
