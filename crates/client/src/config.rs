use std::time::Duration;

/// How long `close` waits for subscription tasks to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
