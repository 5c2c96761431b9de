use std::collections::HashMap;

use uuid::Uuid;

use crate::error::CommandError;

/// Domain ID bindings from a command input.
///
/// Maps domain ID field names to the values the command addresses.
pub type DomainIdBindings = HashMap<&'static str, Vec<String>>;

/// Domain ID values from an event instance.
///
/// Maps domain ID field names to their values in this specific event.
pub type DomainIdValues = HashMap<&'static str, DomainIdValue>;

/// A domain ID value, which may be optional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainIdValue {
    /// A present value
    Value(String),
    /// An absent optional value
    None,
}

impl From<String> for DomainIdValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for DomainIdValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<Uuid> for DomainIdValue {
    fn from(value: Uuid) -> Self {
        Self::Value(value.to_string())
    }
}

impl<T: Into<String>> From<Option<T>> for DomainIdValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v.into()),
            None => Self::None,
        }
    }
}

/// Converts event domain ids into `category:id` tags, sorted for stable output.
///
/// Absent optional values produce no tag.
///
/// # Panics
///
/// Panics if a category contains a colon character.
pub fn into_tags(values: DomainIdValues) -> Vec<String> {
    let mut tags: Vec<_> = values
        .into_iter()
        .filter_map(|(category, id)| {
            assert!(
                !category.contains(':'),
                "domain id categories cannot contain a colon character"
            );
            match id {
                DomainIdValue::Value(id) => Some(format!("{category}:{id}")),
                DomainIdValue::None => None,
            }
        })
        .collect();
    tags.sort();
    tags
}

/// Resolves the single identifier a command addresses.
///
/// Keyed state is owned by exactly one id, so the bindings must hold exactly
/// one non-empty value.
pub fn single_id(bindings: DomainIdBindings) -> Result<String, CommandError> {
    let mut fields: Vec<_> = bindings.into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    let mut ids = fields
        .into_iter()
        .flat_map(|(field, values)| values.into_iter().map(move |value| (field, value)));

    match (ids.next(), ids.next()) {
        (Some((_, id)), None) if !id.trim().is_empty() => Ok(id),
        (Some((field, _)), None) => Err(CommandError::invalid_input(format!(
            "domain id `{field}` must not be empty"
        ))),
        (None, _) => Err(CommandError::invalid_input(
            "command input does not bind a domain id",
        )),
        (Some(_), Some(_)) => Err(CommandError::invalid_input(
            "command input must bind exactly one domain id",
        )),
    }
}
