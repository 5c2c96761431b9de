use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use crate::{client::HelloClient, server::HelloServer};

mod client;
mod commands;
mod events;
mod server;

/// How long to wait for the reply before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout is for the demo output
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let server = HelloServer::new(Uuid::new_v4().to_string());
    let client = HelloClient::new(&server, current_user());

    let result = run(&server, &client).await;
    if let Err(err) = &result {
        error!("round trip failed: {err:#}");
    }

    client.close().await;
    server.shutdown().await;

    result
}

async fn run(server: &HelloServer, client: &HelloClient) -> anyhow::Result<()> {
    server.start()?;

    client.send_command().await?;
    client.wait_until_done(WAIT_TIMEOUT).await?;
    info!(username = client.username(), "round trip complete");

    Ok(())
}

fn current_user() -> String {
    ["USER", "USERNAME"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok().filter(|user| !user.is_empty()))
        .unwrap_or_else(|| "guest".to_string())
}
