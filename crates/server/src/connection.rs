use std::sync::{Arc, PoisonError, RwLock};

use hello_es_sdk::{command::CommandEnvelope, event::Event, transport::Transport};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};

use crate::{
    error::SubmitError,
    router::{Ack, Request},
    subscription::{self, EventFilter, SubscriptionHandle},
};

/// State shared between a server and its connections.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) running: RwLock<Option<Running>>,
}

/// Present between `start` and `shutdown`.
pub(crate) struct Running {
    pub(crate) requests: mpsc::Sender<Request>,
    pub(crate) runtime: Handle,
}

impl Shared {
    fn running<T>(&self, f: impl FnOnce(&Running) -> T) -> Result<T, SubmitError> {
        let running = self.running.read().unwrap_or_else(PoisonError::into_inner);
        match running.as_ref() {
            Some(running) => Ok(f(running)),
            None => Err(self.not_running()),
        }
    }

    fn not_running(&self) -> SubmitError {
        SubmitError::NotRunning(self.name.clone())
    }
}

/// A client's link to an in-process server.
///
/// Connections may be created before the server starts and outlive its
/// shutdown; requests made outside that window fail with
/// [`SubmitError::NotRunning`].
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Connection { shared }
    }

    pub fn server_name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_running(&self) -> bool {
        self.shared.running(|_| ()).is_ok()
    }

    /// Submits a command and waits until it is handled and its events are
    /// published.
    pub async fn submit(&self, envelope: CommandEnvelope) -> Result<Ack, SubmitError> {
        let requests = self.shared.running(|running| running.requests.clone())?;

        let (reply, response) = oneshot::channel();
        requests
            .send(Request { envelope, reply })
            .await
            .map_err(|_| self.shared.not_running())?;

        // The reply is dropped only when the dispatcher is torn down.
        response.await.map_err(|_| self.shared.not_running())?
    }

    /// Subscribes `callback` to every event of type `E` published from now on.
    ///
    /// The callback runs on a separate task, once per event, never
    /// concurrently with itself.
    pub fn subscribe<E, F>(&self, callback: F) -> Result<SubscriptionHandle, SubmitError>
    where
        E: Event,
        F: FnMut(E) + Send + 'static,
    {
        self.subscribe_filtered::<E, F>(EventFilter::default(), callback)
    }

    /// Like [`Connection::subscribe`], for the events that pass `filter`.
    pub fn subscribe_filtered<E, F>(
        &self,
        filter: EventFilter,
        callback: F,
    ) -> Result<SubscriptionHandle, SubmitError>
    where
        E: Event,
        F: FnMut(E) + Send + 'static,
    {
        let runtime = self.shared.running(|running| running.runtime.clone())?;
        let receiver = self.shared.transport.subscribe()?;

        Ok(subscription::spawn::<E, F>(&runtime, receiver, filter, callback))
    }

    /// Cancels a subscription. Cancelling twice is a no-op.
    pub fn cancel(&self, handle: &SubscriptionHandle) {
        handle.cancel();
    }
}
