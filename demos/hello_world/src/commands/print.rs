use hello_es_sdk::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::Printed;

/// Command payload with domain ID bindings
#[derive(Clone, Debug, PartialEq, CommandInput, Serialize, Deserialize)]
#[command_type("Print")]
pub struct Print {
    #[domain_id]
    pub username: String,
    pub text: String,
}

/// Handler state: the lines printed for one user
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Console {
    pub username: String,
    pub lines: Vec<String>,
}

impl Command for Console {
    const STATE_TYPE: &'static str = "Console";
    type Input = Print;

    /// Prints the line as the command is handled, before its state is
    /// committed. A commit that fails afterwards leaves the line printed but
    /// not stored.
    fn handle(mut self, input: Print) -> Result<(Self, Emit), CommandError> {
        println!("[{}] {}", input.username, input.text);

        self.username.clone_from(&input.username);
        self.lines.push(input.text.clone());

        Ok((
            self,
            emit![Printed {
                username: input.username,
                text: input.text,
            }],
        ))
    }
}
