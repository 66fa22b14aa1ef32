//! Metric references
//!
//! Clients send metrics in three shapes:
//! 1. `"metric_name"`: a predefined metric
//! 2. `{"label": "metric_name"}`: legacy wrapper around a predefined metric
//! 3. `{"expressionType": "SIMPLE" | "SQL", ...}`: an ad-hoc metric
//!
//! The legacy wrapper collapses to the plain name.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::domain::error::ValidationError;

const EXPRESSION_TYPE: &str = "expressionType";

#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Named(String),
    Adhoc {
        label: String,
        definition: Map<String, JsonValue>,
    },
}

impl Metric {
    pub fn normalize(raw: &JsonValue) -> Result<Self, ValidationError> {
        match raw {
            JsonValue::String(name) => Ok(Self::Named(name.clone())),
            JsonValue::Object(definition) if definition.contains_key(EXPRESSION_TYPE) => {
                Ok(Self::Adhoc {
                    label: adhoc_label(definition)?,
                    definition: definition.clone(),
                })
            }
            JsonValue::Object(wrapper) => match wrapper.get("label") {
                Some(JsonValue::String(label)) => Ok(Self::Named(label.clone())),
                _ => Err(ValidationError::invalid_field(
                    "metrics",
                    "legacy metric objects must carry a string `label`",
                )),
            },
            other => Err(ValidationError::invalid_field(
                "metrics",
                format!("expected a metric name or definition, got {}", other),
            )),
        }
    }

    /// Output column label of the metric
    pub fn label(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Adhoc { label, .. } => label,
        }
    }

    pub fn is_adhoc(&self) -> bool {
        matches!(self, Self::Adhoc { .. })
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Named(name) => JsonValue::String(name.clone()),
            Self::Adhoc { definition, .. } => JsonValue::Object(definition.clone()),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => serializer.serialize_str(name),
            Self::Adhoc { definition, .. } => definition.serialize(serializer),
        }
    }
}

/// `label`, else the SQL expression, else `AGG(column)`, else the bare column
fn adhoc_label(definition: &Map<String, JsonValue>) -> Result<String, ValidationError> {
    let text = |key: &str| {
        definition
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    };
    if let Some(label) = text("label") {
        return Ok(label.to_string());
    }
    match text(EXPRESSION_TYPE) {
        Some("SQL") => {
            if let Some(sql) = text("sqlExpression") {
                return Ok(sql.to_string());
            }
        }
        Some("SIMPLE") => {
            let column = definition
                .get("column")
                .and_then(|c| c.get("column_name"))
                .and_then(JsonValue::as_str);
            match (text("aggregate"), column) {
                (Some(aggregate), Some(column)) => return Ok(format!("{}({})", aggregate, column)),
                (None, Some(column)) => return Ok(column.to_string()),
                _ => {}
            }
        }
        _ => {}
    }
    Err(ValidationError::invalid_field(
        "metrics",
        "unable to derive a label for ad-hoc metric",
    ))
}
