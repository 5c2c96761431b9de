use std::{collections::HashMap, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};
use hello_es_sdk::prelude::*;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinSet,
};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::{error::SubmitError, locks::KeyedLocks};

/// Acknowledgement of a handled command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    pub command_id: Uuid,
    pub state_key: StateKey,
    /// Version of the state after the command was committed.
    pub version: u64,
    /// Ids of the published events, in emission order.
    pub events: Vec<Uuid>,
}

/// Collaborators shared by every route.
pub(crate) struct Backend {
    pub(crate) storage: Arc<dyn StateStore>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) locks: KeyedLocks,
}

type Route = Box<
    dyn Fn(CommandEnvelope, Arc<Backend>) -> BoxFuture<'static, Result<Ack, SubmitError>>
        + Send
        + Sync,
>;

/// Command type to handler table.
#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<&'static str, Route>,
}

impl Router {
    /// Adds the route for `C`, returning false if its command type is taken.
    pub(crate) fn register<C: Command>(&mut self) -> bool {
        let command_type = <C::Input as CommandInput>::COMMAND_TYPE;
        if self.routes.contains_key(command_type) {
            return false;
        }

        let route: Route = Box::new(|envelope: CommandEnvelope, backend: Arc<Backend>| {
            execute::<C>(envelope, backend).boxed()
        });
        self.routes.insert(command_type, route);
        true
    }

    pub(crate) fn command_types(&self) -> Vec<&'static str> {
        let mut command_types: Vec<_> = self.routes.keys().copied().collect();
        command_types.sort_unstable();
        command_types
    }

    pub(crate) async fn route(
        &self,
        envelope: CommandEnvelope,
        backend: Arc<Backend>,
    ) -> Result<Ack, SubmitError> {
        let Some(route) = self.routes.get(envelope.command_type.as_str()) else {
            return Err(SubmitError::Routing(envelope.command_type));
        };

        route(envelope, backend).await
    }
}

/// Applies one command to its keyed state and publishes the emitted events.
///
/// The key lock is held until every event is published, so events of one
/// key reach the transport in commit order. Publishing is at most once and
/// happens after the commit: if the transport fails, the command still
/// succeeds and the ack lists only the events that were published.
async fn execute<C: Command>(
    envelope: CommandEnvelope,
    backend: Arc<Backend>,
) -> Result<Ack, SubmitError> {
    let input: C::Input = envelope.decode()?;
    let key = C::state_key(&input)?;

    let _guard = backend.locks.lock(&key).await;
    let result = C::execute(&*backend.storage, &key, input)?;

    let event_envelope = EventEnvelope::caused_by(&envelope);
    let mut events = Vec::with_capacity(result.events.len());
    for event in result.events {
        let event = event.into_published(event_envelope);
        let event_id = event.id;
        let event_type = event.event_type.clone();
        match backend.transport.publish(event) {
            Ok(receivers) => {
                debug!(%event_id, %event_type, receivers, "event published");
                events.push(event_id);
            }
            Err(err) => {
                warn!(
                    state_key = %result.key,
                    version = result.version,
                    %event_type,
                    "state committed but its events were not published: {err}"
                );
                break;
            }
        }
    }

    Ok(Ack {
        command_id: envelope.id,
        state_key: result.key,
        version: result.version,
        events,
    })
}

/// A submitted command waiting for the dispatcher.
pub(crate) struct Request {
    pub(crate) envelope: CommandEnvelope,
    pub(crate) reply: oneshot::Sender<Result<Ack, SubmitError>>,
}

/// Receives requests until every sender is gone, handling each on its own
/// task, then waits for the requests still in flight.
pub(crate) async fn dispatch(
    mut requests: mpsc::Receiver<Request>,
    router: Arc<Router>,
    backend: Arc<Backend>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(Request { envelope, reply }) = requests.recv().await {
        let span = info_span!(
            "command",
            command_id = %envelope.id,
            command_type = %envelope.command_type,
            actor = %envelope.actor,
        );
        let router = Arc::clone(&router);
        let backend = Arc::clone(&backend);

        in_flight.spawn(
            async move {
                let result = router.route(envelope, backend).await;
                match &result {
                    Ok(ack) => debug!(
                        state_key = %ack.state_key,
                        version = ack.version,
                        events = ack.events.len(),
                        "command handled"
                    ),
                    Err(err) => warn!(status = %err.status(), "command failed: {err}"),
                }
                // The submitter may have given up waiting.
                let _ = reply.send(result);
            }
            .instrument(span),
        );

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    debug!("dispatcher drained");
}
