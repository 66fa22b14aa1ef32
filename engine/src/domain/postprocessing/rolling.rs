//! `rolling`: windowed statistics over numeric columns

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use super::aggregators::{mean, quantile, variance};
use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Table, Value};

const OPERATION: &str = "rolling";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingType {
    Sum,
    Mean,
    Count,
    Min,
    Max,
    Median,
    Std,
    Var,
    Quantile,
    Cumsum,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollingOptions {
    /// Source column to destination column
    pub columns: OrderedMap<String>,
    pub rolling_type: RollingType,
    #[serde(default)]
    pub window: Option<u64>,
    #[serde(default)]
    pub rolling_type_options: Option<Map<String, JsonValue>>,
    /// Present values needed before a row gets a value; defaults to `window`
    #[serde(default)]
    pub min_periods: Option<u64>,
}

impl RollingOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rolling_type != RollingType::Cumsum {
            match self.window {
                None => {
                    return Err(ValidationError::invalid_options(
                        OPERATION,
                        "Undefined window for rolling operation",
                    ));
                }
                Some(0) => {
                    return Err(ValidationError::invalid_options(
                        OPERATION,
                        "Window must be > 0",
                    ));
                }
                Some(window) => {
                    if let Some(min_periods) = self.min_periods
                        && min_periods > window
                    {
                        return Err(ValidationError::invalid_options(
                            OPERATION,
                            format!("min_periods {} must be <= window {}", min_periods, window),
                        ));
                    }
                }
            }
        }
        self.quantile().map(|_| ())
    }

    /// Quantile for `RollingType::Quantile`; every other type takes no
    /// type options.
    fn quantile(&self) -> Result<Option<f64>, ValidationError> {
        let empty = Map::new();
        let options = self.rolling_type_options.as_ref().unwrap_or(&empty);
        if self.rolling_type != RollingType::Quantile {
            if !options.is_empty() {
                return Err(ValidationError::invalid_options(
                    OPERATION,
                    "rolling_type_options are only supported for quantile",
                ));
            }
            return Ok(None);
        }
        let q = options
            .get("quantile")
            .and_then(JsonValue::as_f64)
            .filter(|q| (0.0..=1.0).contains(q))
            .ok_or_else(|| {
                ValidationError::invalid_options(
                    OPERATION,
                    "quantile requires rolling_type_options.quantile between 0 and 1",
                )
            })?;
        Ok(Some(q))
    }

    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        self.validate()?;
        table.require_all(self.columns.keys())?;
        let q = self.quantile()?;

        let computed: Vec<(&str, Vec<Value>)> = self
            .columns
            .iter()
            .map(|(source, dest)| {
                let values = table.require(source)?.numeric();
                Ok((dest.as_str(), self.compute(&values, q)))
            })
            .collect::<Result<_, ValidationError>>()?;

        let mut out = table.clone();
        for (dest, values) in computed {
            out.upsert_column(dest, values);
        }
        Ok(out)
    }

    fn compute(&self, values: &[Option<f64>], q: Option<f64>) -> Vec<Value> {
        if self.rolling_type == RollingType::Cumsum {
            let mut total = 0.0;
            return values
                .iter()
                .map(|v| match v {
                    Some(v) => {
                        total += v;
                        Value::Float(total)
                    }
                    None => Value::Null,
                })
                .collect();
        }

        let window = self.window.unwrap_or(1).max(1) as usize;
        let min_periods = self.min_periods.map_or(window, |m| m as usize);
        (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
                if self.rolling_type == RollingType::Count {
                    return Value::Float(present.len() as f64);
                }
                if present.len() < min_periods {
                    return Value::Null;
                }
                // only reachable with min_periods = 0
                if present.is_empty() {
                    return match self.rolling_type {
                        RollingType::Sum => Value::Float(0.0),
                        _ => Value::Null,
                    };
                }
                Value::from_f64(match self.rolling_type {
                    RollingType::Sum => Some(present.iter().sum()),
                    RollingType::Mean => mean(&present),
                    RollingType::Min => present.iter().copied().reduce(f64::min),
                    RollingType::Max => present.iter().copied().reduce(f64::max),
                    RollingType::Median => quantile(&present, 0.5),
                    RollingType::Std => variance(&present, 1).map(f64::sqrt),
                    RollingType::Var => variance(&present, 1),
                    RollingType::Quantile => quantile(&present, q.unwrap_or(0.5)),
                    RollingType::Count | RollingType::Cumsum => None,
                })
            })
            .collect()
    }
}
