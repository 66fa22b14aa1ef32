//! Sequential application of post-processing steps

use serde_json::Value as JsonValue;

use super::Transform;
use crate::domain::error::ValidationError;
use crate::domain::table::Table;
use crate::utils::json::is_truthy;

/// One submitted step: the raw object (kept verbatim for cache keys and the
/// canonical mapping) and its parsed transform
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessingStep {
    raw: JsonValue,
    transform: Transform,
}

impl PostProcessingStep {
    pub fn parse(raw: &JsonValue) -> Result<Self, ValidationError> {
        Ok(Self {
            transform: Transform::from_step(raw)?,
            raw: raw.clone(),
        })
    }

    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

/// Parse submitted steps in order, dropping falsy entries (`null`, `{}`, ...)
pub fn parse_steps(values: &[JsonValue]) -> Result<Vec<PostProcessingStep>, ValidationError> {
    values
        .iter()
        .filter(|v| is_truthy(v))
        .map(PostProcessingStep::parse)
        .collect()
}

/// Run every step in order; the output of one step is the input of the next
pub fn apply_post_processing(
    table: Table,
    steps: &[PostProcessingStep],
) -> Result<Table, ValidationError> {
    let mut table = table;
    for (i, step) in steps.iter().enumerate() {
        let rows_in = table.num_rows();
        table = step.transform.apply(&table).inspect_err(|e| {
            tracing::debug!(step = i, operation = step.transform.operation(), error = %e, "Post processing step failed");
        })?;
        tracing::debug!(
            step = i,
            operation = step.transform.operation(),
            rows_in,
            rows_out = table.num_rows(),
            columns = table.num_columns(),
            "Applied post processing step"
        );
    }
    Ok(table)
}
