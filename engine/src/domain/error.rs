//! Validation errors surfaced to API callers
//!
//! Every variant renders a human-readable message. These errors are
//! recoverable: callers either receive them immediately or collect them
//! through `QueryDescriptor::validate(false)`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "Duplicate column/metric labels: {}. Please make sure all columns and metrics have a unique label.",
        quote_join(.0)
    )]
    DuplicateLabels(Vec<String>),

    #[error("`operation` property of post processing object undefined")]
    MissingOperation,

    #[error("Unsupported post processing operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid options for post processing operation {operation}: {reason}")]
    InvalidOptions { operation: String, reason: String },

    #[error("Referenced columns not available in DataFrame: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid aggregator for {name}: {reason}")]
    InvalidAggregator { name: String, reason: String },

    #[error("Invalid post processing options: {0}")]
    InvalidPostProcessing(String),

    #[error("Unable to parse time expression: {0}")]
    TimeParse(String),

    #[error("From date cannot be larger than to date")]
    InvertedTimeRange,

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Malformed query object: {0}")]
    MalformedQuery(String),

    #[error("Datasource {kind}/{id} could not be found")]
    DatasourceNotFound { kind: String, id: i64 },
}

impl ValidationError {
    pub fn invalid_options(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_aggregator(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAggregator {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        Self::MissingColumns(vec![column.to_string()])
    }
}

fn quote_join(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_labels_display() {
        let err = ValidationError::DuplicateLabels(vec!["b".into(), "c".into()]);
        assert_eq!(
            err.to_string(),
            "Duplicate column/metric labels: \"b\", \"c\". Please make sure all columns \
             and metrics have a unique label."
        );
    }

    #[test]
    fn test_unknown_operation_display() {
        let err = ValidationError::UnknownOperation("explode".into());
        assert_eq!(
            err.to_string(),
            "Unsupported post processing operation: explode"
        );
    }

    #[test]
    fn test_missing_columns_display() {
        let err = ValidationError::MissingColumns(vec!["y".into(), "z".into()]);
        assert_eq!(
            err.to_string(),
            "Referenced columns not available in DataFrame: y, z"
        );
    }
}
