use thiserror::Error;

/// Failures reported by a `ModelStore`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unique constraint violated: {model}.{field} = {value}")]
    Constraint {
        model: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{model} {id} not found")]
    NotFound { model: &'static str, id: i64 },

    #[error("Unknown field {model}.{field}")]
    UnknownField { model: &'static str, field: String },

    #[error("Invalid value for {model}.{field}: {reason}")]
    InvalidField {
        model: &'static str,
        field: String,
        reason: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Data-access helper errors
///
/// Every mutation failure is preceded by a rollback and carries the store
/// error as its source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DaoError {
    #[error("DAO is not configured correctly: missing model definition")]
    Config,

    #[error("Create failed: {0}")]
    CreateFailed(#[source] StoreError),

    #[error("Update failed: {0}")]
    UpdateFailed(#[source] StoreError),

    #[error("Delete failed: {0}")]
    DeleteFailed(#[source] StoreError),
}
