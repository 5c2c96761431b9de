use proc_macro2::Span;
use syn::{Attribute, Data, Fields, Ident, LitStr, Meta, spanned::Spanned};

/// Reads a `#[name("...")]` type name attribute, falling back to the ident.
pub fn type_name(attrs: &[Attribute], name: &str, ident: &Ident) -> syn::Result<LitStr> {
    Ok(attrs
        .iter()
        .find(|attr| attr.path().is_ident(name))
        .map(|attr| attr.parse_args::<LitStr>())
        .transpose()?
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span())))
}

/// Collects the fields annotated with `#[domain_id]` or `#[domain_id("category")]`,
/// in declaration order.
pub fn domain_id_fields(data: &Data, span: Span) -> syn::Result<Vec<(Ident, LitStr)>> {
    let Data::Struct(data) = data else {
        return Err(syn::Error::new(span, "expected a struct"));
    };

    let Fields::Named(fields) = &data.fields else {
        return Ok(Vec::new());
    };

    fields
        .named
        .iter()
        .filter_map(|field| {
            let attr = field
                .attrs
                .iter()
                .find(|attr| attr.path().is_ident("domain_id"))?;
            let ident = field.ident.clone()?;

            match &attr.meta {
                Meta::Path(_) => {
                    let category = LitStr::new(&ident.to_string(), ident.span());
                    Some(Ok((ident, category)))
                }
                Meta::List(list) => Some(list.parse_args::<LitStr>().map(|category| (ident, category))),
                Meta::NameValue(meta) => Some(Err(syn::Error::new(
                    meta.span(),
                    "expected `#[domain_id]` or `#[domain_id(\"category\")]`",
                ))),
            }
        })
        .collect()
}
