//! In-memory implementations of the storage and transport contracts.
//!
//! Nothing survives the process. These are meant for demos and tests, and
//! as a reference for real backends.

mod storage;
mod transport;

pub use storage::InMemoryStorage;
pub use transport::{DEFAULT_TRANSPORT_CAPACITY, InMemoryTransport};
