//! Post-processing transforms
//!
//! Each transform is a pure function from a `Table` plus typed options to a
//! new `Table`. Steps arrive as `{"operation": name, "options": {...}}`
//! objects; `Transform::from_step` turns one into a typed variant so that bad
//! names and bad options are rejected before any data is fetched.

mod aggregate;
mod aggregators;
mod contribution;
mod cum;
mod diff;
mod options;
mod pipeline;
mod pivot;
mod rolling;
mod select;
mod sort;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

pub use aggregate::AggregateOptions;
pub use aggregators::{AggregateFunc, AggregateSpec, Aggregator, NamedAggregate};
pub use contribution::{ContributionOptions, Orientation};
pub use cum::{CumOperator, CumOptions};
pub use diff::DiffOptions;
pub use options::OrderedMap;
pub use pipeline::{PostProcessingStep, apply_post_processing, parse_steps};
pub use pivot::PivotOptions;
pub use rolling::{RollingOptions, RollingType};
pub use select::SelectOptions;
pub use sort::SortOptions;

use crate::domain::error::ValidationError;
use crate::domain::table::Table;

/// A post-processing operation with its typed options
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Aggregate(AggregateOptions),
    Pivot(PivotOptions),
    Sort(SortOptions),
    Rolling(RollingOptions),
    Select(SelectOptions),
    Diff(DiffOptions),
    Cum(CumOptions),
    Contribution(ContributionOptions),
}

impl Transform {
    /// Operation names accepted by `from_step`
    pub const OPERATIONS: &'static [&'static str] = &[
        "aggregate",
        "pivot",
        "sort",
        "rolling",
        "select",
        "diff",
        "cum",
        "contribution",
    ];

    /// Parse and validate one `{operation, options}` step
    pub fn from_step(step: &JsonValue) -> Result<Self, ValidationError> {
        let step = step.as_object().ok_or_else(|| {
            ValidationError::InvalidPostProcessing("post processing step must be an object".into())
        })?;
        let operation = step
            .get("operation")
            .and_then(JsonValue::as_str)
            .ok_or(ValidationError::MissingOperation)?;
        let options = match step.get("options") {
            None | Some(JsonValue::Null) => JsonValue::Object(Default::default()),
            Some(options) => options.clone(),
        };

        let transform = match operation {
            "aggregate" => Self::Aggregate(parse_options(operation, options)?),
            "pivot" => Self::Pivot(parse_options(operation, options)?),
            "sort" => Self::Sort(parse_options(operation, options)?),
            "rolling" => Self::Rolling(parse_options(operation, options)?),
            "select" => Self::Select(parse_options(operation, options)?),
            "diff" => Self::Diff(parse_options(operation, options)?),
            "cum" => Self::Cum(parse_options(operation, options)?),
            "contribution" => Self::Contribution(parse_options(operation, options)?),
            other => return Err(ValidationError::UnknownOperation(other.to_string())),
        };
        transform.validate()?;
        Ok(transform)
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Aggregate(_) => "aggregate",
            Self::Pivot(_) => "pivot",
            Self::Sort(_) => "sort",
            Self::Rolling(_) => "rolling",
            Self::Select(_) => "select",
            Self::Diff(_) => "diff",
            Self::Cum(_) => "cum",
            Self::Contribution(_) => "contribution",
        }
    }

    /// Checks that need no data
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Aggregate(options) => options.resolve().map(|_| ()),
            Self::Pivot(options) => options.resolve().map(|_| ()),
            Self::Rolling(options) => options.validate(),
            Self::Contribution(options) => options.validate(),
            Self::Sort(_) | Self::Select(_) | Self::Diff(_) | Self::Cum(_) => Ok(()),
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        match self {
            Self::Aggregate(options) => options.apply(table),
            Self::Pivot(options) => options.apply(table),
            Self::Sort(options) => options.apply(table),
            Self::Rolling(options) => options.apply(table),
            Self::Select(options) => options.apply(table),
            Self::Diff(options) => options.apply(table),
            Self::Cum(options) => options.apply(table),
            Self::Contribution(options) => options.apply(table),
        }
    }
}

fn parse_options<T: DeserializeOwned>(
    operation: &str,
    options: JsonValue,
) -> Result<T, ValidationError> {
    serde_json::from_value(options)
        .map_err(|e| ValidationError::invalid_options(operation, e.to_string()))
}
