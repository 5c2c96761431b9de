use std::sync::Arc;

use hello_es_memory::{InMemoryStorage, InMemoryTransport};
use hello_es_server::{Server, StartupError, SubmitError};

use crate::commands::print::Console;

/// The backend hosting the `Console` handler, on in-memory collaborators.
pub struct HelloServer {
    server: Server,
}

impl HelloServer {
    pub fn new(name: impl Into<String>) -> Self {
        let server = Server::in_process(
            name,
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryTransport::new()),
        )
        .register_command::<Console>()
        .build();

        HelloServer { server }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn start(&self) -> Result<(), StartupError> {
        self.server.start()
    }

    pub async fn shutdown(&self) {
        self.server.shutdown().await;
    }

    /// The lines printed so far for `username`.
    pub fn console(&self, username: &str) -> Result<Option<Console>, SubmitError> {
        self.server.state::<Console>(username)
    }
}
