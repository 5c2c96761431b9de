use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use hello_es_client::{Client, ClientError};
use hello_es_sdk::prelude::*;

use crate::{commands::print::Print, events::Printed, server::HelloServer};

pub const GREETING: &str = "Hello World!";

/// Sends one `Print` command and waits for its `Printed` reply.
pub struct HelloClient {
    client: Client,
    username: String,
    posted: AtomicBool,
}

impl HelloClient {
    pub fn new(server: &HelloServer, username: impl Into<String>) -> Self {
        HelloClient {
            client: Client::in_process(server.server()).build(),
            username: username.into(),
            posted: AtomicBool::new(false),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Posts the greeting, observing the reply before it is submitted.
    ///
    /// The observer prints the reply and then cancels every subscription of
    /// this client.
    pub async fn send_command(&self) -> Result<(), ClientError> {
        let subscriptions = self.client.subscriptions().clone();
        self.client
            .as_guest()
            .command(Print {
                username: self.username.clone(),
                text: GREETING.to_string(),
            })
            .observe(move |printed: Printed| {
                match describe(&printed) {
                    Ok(description) => {
                        println!("The client received the event: `{description}`.");
                    }
                    Err(err) => tracing::warn!("cannot describe received event: {err}"),
                }
                subscriptions.cancel_all();
            })
            .post()
            .await?;

        self.posted.store(true, Ordering::Release);
        Ok(())
    }

    /// True once the command was posted and its reply handled.
    pub fn is_done(&self) -> bool {
        self.posted.load(Ordering::Acquire) && self.client.subscriptions().is_empty()
    }

    /// Waits for the reply to be handled.
    pub async fn wait_until_done(&self, timeout: Duration) -> Result<(), ClientError> {
        self.client.subscriptions().wait_until_empty(timeout).await
    }

    pub async fn close(&self) {
        self.client.close().await;
    }
}

/// The event type followed by its compact JSON payload.
pub fn describe<E: Event>(event: &E) -> Result<String, serde_json::Error> {
    Ok(format!("{}{}", E::EVENT_TYPE, serde_json::to_string(event)?))
}
