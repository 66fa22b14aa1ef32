//! Persistable models and their allow-listed field setters

use serde_json::{Map, Value as JsonValue};

use super::error::StoreError;

/// Assigns one JSON value to one field, or explains why it cannot
pub type FieldSetter<M> = fn(&mut M, &JsonValue) -> Result<(), String>;

pub trait Model: Clone + Default + Send + Sync + 'static {
    /// Model name used in errors and logs
    const KIND: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Fields a property bag may write, by name
    fn field_setters() -> &'static [(&'static str, FieldSetter<Self>)];

    /// `(field, value)` pairs that must be unique across stored models
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Apply a property bag field by field through the setter table
    fn apply(&mut self, properties: &Map<String, JsonValue>) -> Result<(), StoreError> {
        for (field, value) in properties {
            let setter = Self::field_setters()
                .iter()
                .find(|(name, _)| *name == field.as_str())
                .map(|(_, setter)| setter)
                .ok_or_else(|| StoreError::UnknownField {
                    model: Self::KIND,
                    field: field.clone(),
                })?;
            setter(self, value).map_err(|reason| StoreError::InvalidField {
                model: Self::KIND,
                field: field.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

pub fn expect_string(value: &JsonValue) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected a string, got {}", value))
}

pub fn expect_optional_string(value: &JsonValue) -> Result<Option<String>, String> {
    match value {
        JsonValue::Null => Ok(None),
        other => expect_string(other).map(Some),
    }
}

pub fn expect_bool(value: &JsonValue) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected a boolean, got {}", value))
}
