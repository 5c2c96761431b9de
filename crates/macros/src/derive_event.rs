use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Ident, LitStr,
    parse::{Parse, ParseStream},
};

use crate::attrs::{domain_id_fields, type_name};

#[derive(Debug)]
pub struct DeriveEvent {
    ident: Ident,
    event_type: LitStr,
    domain_ids: Vec<(Ident, LitStr)>,
}

impl DeriveEvent {
    pub fn expand(self) -> TokenStream {
        let Self {
            ident,
            event_type,
            domain_ids,
        } = self;

        let categories = domain_ids.iter().map(|(_, category)| category);
        let domain_ids_inserts = domain_ids.iter().map(|(field, category)| {
            quote! {
                ids.insert(#category, ::hello_es_sdk::domain_id::DomainIdValue::from(::std::clone::Clone::clone(&self.#field)));
            }
        });

        quote! {
            #[automatically_derived]
            impl ::hello_es_sdk::event::Event for #ident {
                const EVENT_TYPE: &'static str = #event_type;
                const DOMAIN_ID_FIELDS: &'static [&'static str] = &[ #( #categories ),* ];

                fn domain_ids(&self) -> ::hello_es_sdk::domain_id::DomainIdValues {
                    #[allow(unused_mut)]
                    let mut ids = ::std::collections::HashMap::new();
                    #( #domain_ids_inserts )*
                    ids
                }
            }
        }
    }
}

impl Parse for DeriveEvent {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let input: DeriveInput = input.parse()?;

        let event_type = type_name(&input.attrs, "event_type", &input.ident)?;
        let domain_ids = domain_id_fields(&input.data, input.ident.span())?;

        Ok(DeriveEvent {
            ident: input.ident,
            event_type,
            domain_ids,
        })
    }
}
