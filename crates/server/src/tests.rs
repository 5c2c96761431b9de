use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use hello_es_memory::{InMemoryStorage, InMemoryTransport};
use hello_es_sdk::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, time::timeout};

use super::*;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, CommandInput, Serialize, Deserialize)]
struct Add {
    #[domain_id]
    counter: String,
    amount: u64,
}

#[derive(Clone, Debug, PartialEq, Event, Serialize, Deserialize)]
struct Added {
    #[domain_id]
    counter: String,
    amount: u64,
    total: u64,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    total: u64,
}

impl Command for Counter {
    const STATE_TYPE: &'static str = "Counter";
    type Input = Add;

    fn handle(mut self, input: Add) -> Result<(Self, Emit), CommandError> {
        if input.amount == 0 {
            return Err(CommandError::rejected("nothing to add"));
        }

        self.total += input.amount;
        let total = self.total;
        Ok((
            self,
            emit![Added {
                counter: input.counter,
                amount: input.amount,
                total,
            }],
        ))
    }
}

fn add(counter: &str, amount: u64) -> CommandEnvelope {
    let input = Add {
        counter: counter.into(),
        amount,
    };
    CommandEnvelope::new(&input, Actor::Guest).unwrap()
}

fn server_with(storage: Arc<InMemoryStorage>) -> Server {
    Server::in_process("test", storage, Arc::new(InMemoryTransport::new()))
        .register_command::<Counter>()
        .build()
}

fn server() -> Server {
    server_with(Arc::new(InMemoryStorage::new()))
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_commits_state_and_delivers_event() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection
        .subscribe::<Added, _>(move |event| {
            let _ = tx.send(event);
        })
        .unwrap();

    let ack = connection.submit(add("a", 3)).await.unwrap();

    assert_eq!(ack.state_key, StateKey::new("Counter", "a"));
    assert_eq!(ack.version, 1);
    assert_eq!(ack.events.len(), 1);

    let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(
        event,
        Added {
            counter: "a".into(),
            amount: 3,
            total: 3,
        }
    );
    assert_eq!(
        server.state::<Counter>("a").unwrap(),
        Some(Counter { total: 3 })
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn state_is_committed_before_event_is_delivered() {
    let storage = Arc::new(InMemoryStorage::new());
    let server = server_with(Arc::clone(&storage));
    server.start().unwrap();
    let connection = server.connect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observed = Arc::clone(&storage);
    connection
        .subscribe::<Added, _>(move |_| {
            let stored = observed
                .load(&StateKey::new("Counter", "a"))
                .unwrap()
                .map(|state| state.version);
            let _ = tx.send(stored);
        })
        .unwrap();

    connection.submit(add("a", 1)).await.unwrap();

    let version = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(version, Some(1));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_command_type_is_a_routing_error() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection
        .subscribe::<Added, _>(move |event: Added| {
            let _ = tx.send(event.amount);
        })
        .unwrap();

    let mut envelope = add("a", 1);
    envelope.command_type = "Subtract".to_string();
    let err = connection.submit(envelope).await.unwrap_err();

    assert!(matches!(&err, SubmitError::Routing(command_type) if command_type == "Subtract"));
    assert_eq!(err.status(), ErrorStatus::NotFound);

    // Only the second command's event arrives.
    connection.submit(add("a", 7)).await.unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(7));
    assert_eq!(server.state::<Counter>("a").unwrap().unwrap().total, 7);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_command_leaves_state_untouched() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    connection.submit(add("a", 2)).await.unwrap();
    let err = connection.submit(add("a", 0)).await.unwrap_err();

    assert!(matches!(err, SubmitError::Handler(_)));
    assert_eq!(err.status(), ErrorStatus::Rejected);
    assert_eq!(server.state::<Counter>("a").unwrap().unwrap().total, 2);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_domain_id_is_invalid_input() {
    let server = server();
    server.start().unwrap();

    let err = server.connect().submit(add("", 1)).await.unwrap_err();

    assert_eq!(err.status(), ErrorStatus::InvalidInput);
    assert_eq!(server.state::<Counter>("").unwrap(), None);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_commands_on_one_key_all_commit() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let submits = (0..20).map(|_| {
        let connection = connection.clone();
        async move { connection.submit(add("shared", 1)).await }
    });
    let results = join_all(submits).await;

    let mut versions: Vec<u64> = results
        .into_iter()
        .map(|result| result.unwrap().version)
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=20).collect::<Vec<_>>());
    assert_eq!(server.state::<Counter>("shared").unwrap().unwrap().total, 20);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_fails_when_not_running() {
    let server = server();
    let connection = server.connect();

    let err = connection.submit(add("a", 1)).await.unwrap_err();
    assert!(matches!(&err, SubmitError::NotRunning(name) if name == "test"));
    assert!(connection.subscribe::<Added, _>(|_| {}).is_err());

    server.start().unwrap();
    connection.submit(add("a", 1)).await.unwrap();
    server.shutdown().await;

    let err = connection.submit(add("a", 1)).await.unwrap_err();
    assert_eq!(err.status(), ErrorStatus::Unavailable);
    assert!(!connection.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn start_twice_is_rejected() {
    let server = server();
    server.start().unwrap();

    let err = server.start().unwrap_err();
    assert!(matches!(err, StartupError::AlreadyRunning(name) if name == "test"));

    server.shutdown().await;
}

#[test]
fn start_requires_a_runtime() {
    let server = server();

    let err = server.start().unwrap_err();

    assert!(matches!(err, StartupError::NoRuntime { .. }));
    assert!(!server.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_idempotent_and_server_restarts() {
    let server = server();
    server.shutdown().await;

    server.start().unwrap();
    server.shutdown().await;
    server.shutdown().await;
    assert!(!server.is_running());

    server.start().unwrap();
    let ack = server.connect().submit(add("a", 1)).await.unwrap();
    assert_eq!(ack.version, 1);
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_ends_subscriptions() {
    let server = server();
    server.start().unwrap();
    let handle = server.connect().subscribe::<Added, _>(|_| {}).unwrap();

    server.shutdown().await;

    timeout(WAIT, handle.stopped()).await.unwrap();
    assert!(!handle.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_subscription_receives_nothing_further() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = connection
        .subscribe::<Added, _>(move |event: Added| {
            let _ = tx.send(event.total);
        })
        .unwrap();

    connection.submit(add("a", 1)).await.unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));

    assert!(handle.cancel());
    assert!(!handle.cancel());
    connection.cancel(&handle);
    timeout(WAIT, handle.stopped()).await.unwrap();

    connection.submit(add("a", 1)).await.unwrap();
    // The callback, and with it the sender, is gone.
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);

    server.shutdown().await;
}

#[test]
#[should_panic(expected = "already registered")]
fn duplicate_registration_panics() {
    Server::in_process(
        "test",
        Arc::new(InMemoryStorage::new()),
        Arc::new(InMemoryTransport::new()),
    )
    .register_command::<Counter>()
    .register_command::<Counter>();
}

#[test]
fn builder_applies_config() {
    let server = Server::in_process(
        "test",
        Arc::new(InMemoryStorage::new()),
        Arc::new(InMemoryTransport::new()),
    )
    .register_command::<Counter>()
    .command_buffer(8)
    .shutdown_timeout(Duration::from_millis(100))
    .build();

    assert_eq!(server.name(), "test");
    assert_eq!(server.command_types(), vec!["Add"]);
    assert_eq!(
        *server.config(),
        ServerConfig {
            command_buffer: 8,
            shutdown_timeout: Duration::from_millis(100),
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn tagged_subscription_sees_only_its_key() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let filter = EventFilter::default().tagged("counter", "b");
    connection
        .subscribe_filtered::<Added, _>(filter, move |event| {
            let _ = tx.send(event.counter);
        })
        .unwrap();

    connection.submit(add("a", 1)).await.unwrap();
    connection.submit(add("b", 1)).await.unwrap();

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some("b".to_string()));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn correlated_subscription_ignores_other_commands() {
    let server = server();
    server.start().unwrap();
    let connection = server.connect();

    let awaited = add("a", 1);
    let (tx, mut rx) = mpsc::unbounded_channel();
    connection
        .subscribe_filtered::<Added, _>(EventFilter::caused_by(awaited.id), move |event| {
            let _ = tx.send(event.amount);
        })
        .unwrap();

    connection.submit(add("a", 5)).await.unwrap();
    connection.submit(awaited).await.unwrap();

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));

    server.shutdown().await;
}

/// Opens and subscribes like the in-memory transport, but never publishes.
struct UnpublishableTransport(InMemoryTransport);

impl Transport for UnpublishableTransport {
    fn open(&self) -> Result<(), TransportError> {
        self.0.open()
    }

    fn publish(&self, _event: PublishedEvent) -> Result<usize, TransportError> {
        Err(TransportError::Closed)
    }

    fn subscribe(&self) -> Result<EventReceiver, TransportError> {
        self.0.subscribe()
    }

    fn close(&self) {
        self.0.close();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_publish_still_acks_committed_state() {
    let server = Server::in_process(
        "test",
        Arc::new(InMemoryStorage::new()),
        Arc::new(UnpublishableTransport(InMemoryTransport::new())),
    )
    .register_command::<Counter>()
    .build();
    server.start().unwrap();

    let ack = server.connect().submit(add("a", 4)).await.unwrap();

    assert_eq!(ack.version, 1);
    assert!(ack.events.is_empty());
    assert_eq!(server.state::<Counter>("a").unwrap().unwrap().total, 4);

    server.shutdown().await;
}
