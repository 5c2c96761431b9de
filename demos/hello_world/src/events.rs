use hello_es_sdk::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Event, Serialize, Deserialize)]
#[event_type("Printed")]
pub struct Printed {
    #[domain_id]
    pub username: String,
    pub text: String,
}
