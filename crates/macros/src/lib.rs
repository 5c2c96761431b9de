mod attrs;
mod derive_command_input;
mod derive_event;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::derive_command_input::DeriveCommandInput;
use crate::derive_event::DeriveEvent;

#[proc_macro_derive(CommandInput, attributes(command_type, domain_id))]
pub fn command_input(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveCommandInput);
    TokenStream::from(input.expand())
}

#[proc_macro_derive(Event, attributes(event_type, domain_id))]
pub fn event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveEvent);
    TokenStream::from(input.expand())
}
