use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Ident, LitStr,
    parse::{Parse, ParseStream},
};

use crate::attrs::{domain_id_fields, type_name};

#[derive(Debug)]
pub struct DeriveCommandInput {
    ident: Ident,
    command_type: LitStr,
    domain_ids: Vec<(Ident, LitStr)>,
}

impl DeriveCommandInput {
    pub fn expand(self) -> TokenStream {
        let Self {
            ident,
            command_type,
            domain_ids,
        } = self;

        let domain_ids_inserts = domain_ids.into_iter().map(|(field, category)| {
            quote! {
                if let ::hello_es_sdk::domain_id::DomainIdValue::Value(domain_id) = ::std::convert::Into::into(::std::clone::Clone::clone(&self.#field)) {
                    bindings
                        .entry(#category)
                        .or_insert_with(::std::vec::Vec::new)
                        .push(domain_id);
                }
            }
        });

        quote! {
            #[automatically_derived]
            impl ::hello_es_sdk::command::CommandInput for #ident {
                const COMMAND_TYPE: &'static str = #command_type;

                fn domain_id_bindings(&self) -> ::hello_es_sdk::domain_id::DomainIdBindings {
                    #[allow(unused_mut)]
                    let mut bindings: ::hello_es_sdk::domain_id::DomainIdBindings = ::std::collections::HashMap::new();
                    #( #domain_ids_inserts )*
                    bindings
                }
            }
        }
    }
}

impl Parse for DeriveCommandInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let input: DeriveInput = input.parse()?;

        let command_type = type_name(&input.attrs, "command_type", &input.ident)?;
        let domain_ids = domain_id_fields(&input.data, input.ident.span())?;

        Ok(DeriveCommandInput {
            ident: input.ident,
            command_type,
            domain_ids,
        })
    }
}
