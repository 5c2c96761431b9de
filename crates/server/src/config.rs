use std::time::Duration;

/// Number of submitted commands buffered ahead of the dispatcher.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// How long shutdown waits for in-flight commands before aborting them.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub command_buffer: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            command_buffer: DEFAULT_COMMAND_BUFFER,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
