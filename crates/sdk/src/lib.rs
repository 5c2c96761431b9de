//! # hello-es SDK
//!
//! Traits and types for writing keyed command handlers served by an
//! in-process command backend.
//!
//! ## Overview
//!
//! A command handler:
//!
//! 1. Declares its input (via `CommandInput`), whose type name routes it and
//!    whose `#[domain_id]` field names the keyed state it addresses
//! 2. Is its own state: one `Default`-initialized instance per domain id
//! 3. Reduces the current state and the input into the next state plus the
//!    events to publish (via `handle`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use hello_es_sdk::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(CommandInput, Serialize, Deserialize)]
//! struct Print {
//!     #[domain_id]
//!     username: String,
//!     text: String,
//! }
//!
//! #[derive(Event, Serialize, Deserialize)]
//! struct Printed {
//!     #[domain_id]
//!     username: String,
//!     text: String,
//! }
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Console {
//!     lines: Vec<String>,
//! }
//!
//! impl Command for Console {
//!     const STATE_TYPE: &'static str = "Console";
//!     type Input = Print;
//!
//!     fn handle(mut self, input: Print) -> Result<(Self, Emit), CommandError> {
//!         self.lines.push(input.text.clone());
//!         Ok((self, emit![Printed {
//!             username: input.username,
//!             text: input.text,
//!         }]))
//!     }
//! }
//! ```

extern crate self as hello_es_sdk;

pub use hello_es_sdk_macros::{CommandInput, Event};

pub mod command;
pub mod domain_id;
pub mod emit;
pub mod error;
pub mod event;
#[macro_use]
mod macros;
pub mod storage;
pub mod transport;

pub mod prelude {
    pub use crate::command::*;
    pub use crate::domain_id::*;
    pub use crate::emit;
    pub use crate::emit::*;
    pub use crate::error::*;
    pub use crate::event::*;
    pub use crate::storage::*;
    pub use crate::transport::*;
    pub use hello_es_sdk_macros::{CommandInput, Event};
}
