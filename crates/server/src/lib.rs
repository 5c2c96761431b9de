//! # hello-es server
//!
//! An in-process command backend. Commands are routed by type to the one
//! handler registered for them, applied to the handler's keyed state under a
//! per-key lock, and the emitted events are published to subscribers.
//!
//! Storage and transport are injected at construction:
//!
//! ```rust,ignore
//! let server = Server::in_process(name, storage, transport)
//!     .register_command::<Console>()
//!     .build();
//!
//! server.start()?;
//! let ack = server.connect().submit(envelope).await?;
//! server.shutdown().await;
//! ```

pub mod config;
mod connection;
pub mod error;
mod locks;
mod router;
pub mod subscription;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use hello_es_sdk::prelude::*;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

pub use crate::config::ServerConfig;
pub use crate::connection::Connection;
pub use crate::error::{ErrorStatus, StartupError, SubmitError};
pub use crate::router::Ack;
pub use crate::subscription::{EventFilter, SubscriptionHandle};

use crate::{
    connection::{Running, Shared},
    locks::KeyedLocks,
    router::{Backend, Router},
};

pub struct Server {
    shared: Arc<Shared>,
    router: Arc<Router>,
    backend: Arc<Backend>,
    config: ServerConfig,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Starts building a server hosted inside this process.
    pub fn in_process(
        name: impl Into<String>,
        storage: Arc<dyn StateStore>,
        transport: Arc<dyn Transport>,
    ) -> ServerBuilder {
        ServerBuilder {
            name: name.into(),
            storage,
            transport,
            router: Router::default(),
            config: ServerConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The registered command types, sorted.
    pub fn command_types(&self) -> Vec<&'static str> {
        self.router.command_types()
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Opens a connection to this server.
    pub fn connect(&self) -> Connection {
        Connection::new(Arc::clone(&self.shared))
    }

    /// Opens the collaborators and starts accepting commands.
    ///
    /// Must be called from within a tokio runtime; delivery tasks run on it.
    pub fn start(&self) -> Result<(), StartupError> {
        let mut running = self
            .shared
            .running
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(StartupError::AlreadyRunning(self.shared.name.clone()));
        }

        let runtime = Handle::try_current().map_err(|source| StartupError::NoRuntime {
            name: self.shared.name.clone(),
            source,
        })?;

        self.backend.storage.open()?;
        if let Err(err) = self.backend.transport.open() {
            self.backend.storage.close();
            return Err(err.into());
        }

        let (requests, receiver) = mpsc::channel(self.config.command_buffer.max(1));
        let dispatcher = runtime.spawn(router::dispatch(
            receiver,
            Arc::clone(&self.router),
            Arc::clone(&self.backend),
        ));
        *self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(dispatcher);
        *running = Some(Running { requests, runtime });

        info!(
            server = %self.shared.name,
            command_types = ?self.router.command_types(),
            "server started"
        );

        Ok(())
    }

    /// Stops accepting commands, drains the ones in flight and closes the
    /// collaborators.
    ///
    /// Commands still running after the shutdown timeout are aborted. Calling
    /// this on a server that is not running does nothing.
    pub async fn shutdown(&self) {
        let running = self
            .shared
            .running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if running.is_none() {
            debug!(server = %self.shared.name, "server not running, nothing to shut down");
            return;
        }
        // Dropping the sender lets the dispatcher finish the queued requests.
        drop(running);

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut dispatcher) = dispatcher {
            if tokio::time::timeout(self.config.shutdown_timeout, &mut dispatcher)
                .await
                .is_err()
            {
                warn!(
                    server = %self.shared.name,
                    timeout = ?self.config.shutdown_timeout,
                    "commands still in flight at shutdown timeout, aborting"
                );
                dispatcher.abort();
            }
        }

        self.backend.transport.close();
        self.backend.storage.close();

        info!(server = %self.shared.name, "server stopped");
    }

    /// Reads the committed state of handler `C` for `id`.
    pub fn state<C: Command>(&self, id: &str) -> Result<Option<C>, SubmitError> {
        let key = StateKey::new(C::STATE_TYPE, id);
        let Some(stored) = self.backend.storage.load(&key)? else {
            return Ok(None);
        };

        let state = serde_json::from_value(stored.data).map_err(SerializationError::from)?;
        Ok(Some(state))
    }
}

pub struct ServerBuilder {
    name: String,
    storage: Arc<dyn StateStore>,
    transport: Arc<dyn Transport>,
    router: Router,
    config: ServerConfig,
}

impl ServerBuilder {
    /// Routes commands of `C::Input` to handler `C`.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for the same command type.
    pub fn register_command<C: Command>(mut self) -> Self {
        let command_type = <C::Input as CommandInput>::COMMAND_TYPE;
        assert!(
            self.router.register::<C>(),
            "a handler is already registered for command type `{command_type}`"
        );
        self
    }

    pub fn command_buffer(mut self, command_buffer: usize) -> Self {
        self.config.command_buffer = command_buffer;
        self
    }

    pub fn shutdown_timeout(mut self, shutdown_timeout: std::time::Duration) -> Self {
        self.config.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Server {
        Server {
            shared: Arc::new(Shared {
                name: self.name,
                transport: Arc::clone(&self.transport),
                running: RwLock::new(None),
            }),
            router: Arc::new(self.router),
            backend: Arc::new(Backend {
                storage: self.storage,
                transport: self.transport,
                locks: KeyedLocks::default(),
            }),
            config: self.config,
            dispatcher: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests;
