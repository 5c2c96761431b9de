//! # hello-es client
//!
//! Posts commands to a server and observes the events they cause.
//!
//! ```rust,ignore
//! let client = Client::in_process(&server).build();
//!
//! let subscriptions = client.subscriptions().clone();
//! client
//!     .as_guest()
//!     .command(Print { username, text })
//!     .observe(move |printed: Printed| {
//!         println!("{}", printed.text);
//!         subscriptions.cancel_all();
//!     })
//!     .post()
//!     .await?;
//!
//! client.subscriptions().wait_until_empty(timeout).await?;
//! client.close().await;
//! ```

pub mod config;
pub mod error;
mod subscriptions;

use std::{
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::future::join_all;
use hello_es_sdk::prelude::*;
use hello_es_server::{Ack, Connection, EventFilter, Server, SubmitError, SubscriptionHandle};
use tracing::{debug, warn};

pub use crate::config::ClientConfig;
pub use crate::error::ClientError;
pub use crate::subscriptions::Subscriptions;

pub struct Client {
    connection: Connection,
    subscriptions: Subscriptions,
    config: ClientConfig,
    /// Handles whose tasks may still run, so `close` can wait for them.
    posted: Mutex<Vec<SubscriptionHandle>>,
    closed: AtomicBool,
}

impl Client {
    /// Starts building a client connected to a server in this process.
    pub fn in_process(server: &Server) -> ClientBuilder {
        ClientBuilder {
            connection: server.connect(),
            config: ClientConfig::default(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Requests made without an identity.
    pub fn as_guest(&self) -> Requester<'_> {
        Requester {
            client: self,
            actor: Actor::Guest,
        }
    }

    /// Requests made on behalf of `user`.
    pub fn on_behalf_of(&self, user: impl Into<String>) -> Requester<'_> {
        Requester {
            client: self,
            actor: Actor::User(user.into()),
        }
    }

    /// Cancels the remaining subscriptions and waits for their tasks to stop.
    ///
    /// Waits at most the configured shutdown timeout. Closing twice is a
    /// no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let cancelled = self.subscriptions.cancel_all();
        let handles = std::mem::take(&mut *self.posted());
        debug!(cancelled, subscriptions = handles.len(), "closing client");

        let stopped = join_all(handles.iter().map(|handle| handle.stopped()));
        if tokio::time::timeout(self.config.shutdown_timeout, stopped)
            .await
            .is_err()
        {
            warn!(
                timeout = ?self.config.shutdown_timeout,
                "subscription tasks still running after close timeout"
            );
        }
    }

    fn cancel_each(&self, handles: &[SubscriptionHandle]) {
        for handle in handles {
            self.subscriptions.cancel(handle);
        }
    }

    /// Tracks `handle` until its task ends, forgetting the ones that have.
    fn track(&self, handle: SubscriptionHandle) {
        let mut posted = self.posted();
        posted.retain(|tracked| !tracked.is_stopped());
        posted.push(handle);
    }

    fn posted(&self) -> MutexGuard<'_, Vec<SubscriptionHandle>> {
        self.posted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ClientBuilder {
    connection: Connection,
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.config.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Client {
        Client {
            connection: self.connection,
            subscriptions: Subscriptions::new(),
            config: self.config,
            posted: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }
}

/// Builds requests for one actor.
pub struct Requester<'a> {
    client: &'a Client,
    actor: Actor,
}

impl<'a> Requester<'a> {
    pub fn command<I: CommandInput>(self, input: I) -> CommandRequest<'a> {
        CommandRequest {
            client: self.client,
            envelope: CommandEnvelope::new(&input, self.actor),
            observers: Vec::new(),
        }
    }
}

type Observer = Box<
    dyn FnOnce(&Connection, EventFilter) -> Result<SubscriptionHandle, SubmitError>
        + Send
        + 'static,
>;

/// A command waiting to be posted, with the observers to register first.
#[must_use = "a command request does nothing until posted"]
pub struct CommandRequest<'a> {
    client: &'a Client,
    envelope: Result<CommandEnvelope, SerializationError>,
    observers: Vec<Observer>,
}

impl CommandRequest<'_> {
    /// Calls `callback` for every `E` caused by this command.
    pub fn observe<E, F>(mut self, callback: F) -> Self
    where
        E: Event,
        F: FnMut(E) + Send + 'static,
    {
        self.observers.push(Box::new(
            move |connection: &Connection, filter: EventFilter| {
                connection.subscribe_filtered::<E, F>(filter, callback)
            },
        ));
        self
    }

    /// Registers the observers, then submits the command.
    ///
    /// If the submission fails, the observers registered for it are
    /// cancelled before the error is returned.
    pub async fn post(self) -> Result<Posted, ClientError> {
        let client = self.client;
        if client.is_closed() {
            return Err(ClientError::Closed);
        }
        let envelope = self.envelope?;

        let mut handles = Vec::with_capacity(self.observers.len());
        for observer in self.observers {
            match observer(&client.connection, EventFilter::caused_by(envelope.id)) {
                Ok(handle) => {
                    client.subscriptions.add(handle.clone());
                    client.track(handle.clone());
                    handles.push(handle);
                }
                Err(err) => {
                    client.cancel_each(&handles);
                    return Err(err.into());
                }
            }
        }

        match client.connection.submit(envelope).await {
            Ok(ack) => Ok(Posted {
                ack,
                subscriptions: handles,
            }),
            Err(err) => {
                client.cancel_each(&handles);
                Err(err.into())
            }
        }
    }
}

/// A successfully posted command.
#[derive(Debug)]
pub struct Posted {
    pub ack: Ack,
    /// The observers registered for the command, in registration order.
    pub subscriptions: Vec<SubscriptionHandle>,
}

#[cfg(test)]
impl Client {
    fn tracked(&self) -> usize {
        self.posted().len()
    }
}
