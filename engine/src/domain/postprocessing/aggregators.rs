//! Named aggregate operators and the statistics behind them
//!
//! Operators skip absent values. `count` counts every present cell whatever
//! its type; the other operators read the numeric view of each cell. A group
//! with no present values aggregates to absent, except for `count` which
//! reports 0.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::domain::error::ValidationError;
use crate::domain::table::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Prod,
    Std,
    Var,
    Count,
    Percentile,
}

impl FromStr for Aggregator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name.strip_prefix("nan").unwrap_or(&name);
        match name {
            "sum" => Ok(Self::Sum),
            "mean" | "average" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" | "amin" => Ok(Self::Min),
            "max" | "amax" => Ok(Self::Max),
            "prod" | "product" => Ok(Self::Prod),
            "std" => Ok(Self::Std),
            "var" => Ok(Self::Var),
            "count" => Ok(Self::Count),
            "percentile" => Ok(Self::Percentile),
            _ => Err(format!("Invalid numpy function: {}", s)),
        }
    }
}

/// Aggregate spec as submitted: `{column, operator, options}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    /// Source column; defaults to the aggregate's own name
    pub column: Option<String>,
    pub operator: Option<String>,
    #[serde(default)]
    pub options: Map<String, JsonValue>,
}

/// Aggregator bound to its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateFunc {
    pub aggregator: Aggregator,
    /// Percentile in `[0, 100]`, only for `Percentile`
    pub q: Option<f64>,
}

/// Fully resolved aggregate: output name, source column, function
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAggregate {
    pub name: String,
    pub column: String,
    pub func: AggregateFunc,
}

impl AggregateSpec {
    /// Resolve against a default operator; `None` makes the operator
    /// mandatory.
    pub fn resolve(
        &self,
        name: &str,
        default: Option<Aggregator>,
    ) -> Result<NamedAggregate, ValidationError> {
        let aggregator = match (&self.operator, default) {
            (Some(op), _) => op
                .parse::<Aggregator>()
                .map_err(|reason| ValidationError::invalid_aggregator(name, reason))?,
            (None, Some(default)) => default,
            (None, None) => {
                return Err(ValidationError::invalid_aggregator(
                    name,
                    "Operator undefined for aggregator",
                ));
            }
        };

        let q = if aggregator == Aggregator::Percentile {
            let q = self
                .options
                .get("q")
                .and_then(JsonValue::as_f64)
                .ok_or_else(|| {
                    ValidationError::invalid_aggregator(name, "percentile requires options.q")
                })?;
            if !(0.0..=100.0).contains(&q) {
                return Err(ValidationError::invalid_aggregator(
                    name,
                    "percentile options.q must be between 0 and 100",
                ));
            }
            Some(q)
        } else {
            None
        };

        let unknown: Vec<&str> = self
            .options
            .keys()
            .map(String::as_str)
            .filter(|k| !(aggregator == Aggregator::Percentile && *k == "q"))
            .collect();
        if !unknown.is_empty() {
            return Err(ValidationError::invalid_aggregator(
                name,
                format!("unsupported options: {}", unknown.join(", ")),
            ));
        }

        Ok(NamedAggregate {
            name: name.to_string(),
            column: self.column.clone().unwrap_or_else(|| name.to_string()),
            func: AggregateFunc { aggregator, q },
        })
    }
}

impl AggregateFunc {
    /// Aggregate the cells of one group
    pub fn apply(&self, cells: &[&Value]) -> Value {
        if self.aggregator == Aggregator::Count {
            return Value::Int(cells.iter().filter(|v| !v.is_null()).count() as i64);
        }
        let present: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
        if present.is_empty() {
            return Value::Null;
        }
        let result = match self.aggregator {
            Aggregator::Sum => Some(present.iter().sum()),
            Aggregator::Mean => mean(&present),
            Aggregator::Median => quantile(&present, 0.5),
            Aggregator::Min => present.iter().copied().reduce(f64::min),
            Aggregator::Max => present.iter().copied().reduce(f64::max),
            Aggregator::Prod => Some(present.iter().product()),
            Aggregator::Std => variance(&present, 0).map(f64::sqrt),
            Aggregator::Var => variance(&present, 0),
            Aggregator::Percentile => quantile(&present, self.q.unwrap_or(50.0) / 100.0),
            Aggregator::Count => None,
        };
        Value::from_f64(result)
    }
}

// =============================================================================
// Statistics over present values
// =============================================================================

pub(super) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Variance with `ddof` delta degrees of freedom
pub(super) fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (n - ddof) as f64)
}

/// Quantile `p` in `[0, 1]` with linear interpolation between closest ranks
pub(super) fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: JsonValue) -> AggregateSpec {
        serde_json::from_value(value).unwrap()
    }

    fn cells(values: &[Option<f64>]) -> Vec<Value> {
        values.iter().map(|v| Value::from_f64(*v)).collect()
    }

    fn apply(func: AggregateFunc, values: &[Value]) -> Value {
        let refs: Vec<&Value> = values.iter().collect();
        func.apply(&refs)
    }

    fn func(aggregator: Aggregator) -> AggregateFunc {
        AggregateFunc {
            aggregator,
            q: None,
        }
    }

    #[test]
    fn test_operator_aliases() {
        assert_eq!("nansum".parse::<Aggregator>(), Ok(Aggregator::Sum));
        assert_eq!("average".parse::<Aggregator>(), Ok(Aggregator::Mean));
        assert_eq!("nanpercentile".parse::<Aggregator>(), Ok(Aggregator::Percentile));
        assert_eq!("product".parse::<Aggregator>(), Ok(Aggregator::Prod));
        assert!("explode".parse::<Aggregator>().is_err());
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = cells(&(0..=100).map(|i| Some(i as f64)).collect::<Vec<_>>());
        let p75 = AggregateFunc {
            aggregator: Aggregator::Percentile,
            q: Some(75.0),
        };
        assert_eq!(apply(p75, &values), Value::Float(75.0));

        let small = cells(&[Some(1.0), Some(2.0), Some(4.0), Some(3.0)]);
        let median = AggregateFunc {
            aggregator: Aggregator::Percentile,
            q: Some(50.0),
        };
        assert_eq!(apply(median, &small), Value::Float(2.5));
    }

    #[test]
    fn test_absent_values_skipped() {
        let values = cells(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(apply(func(Aggregator::Sum), &values), Value::Float(4.0));
        assert_eq!(apply(func(Aggregator::Mean), &values), Value::Float(2.0));
        assert_eq!(apply(func(Aggregator::Count), &values), Value::Int(2));
    }

    #[test]
    fn test_count_includes_non_numeric_cells() {
        let values = vec![Value::from("x"), Value::Null, Value::from("z"), Value::Bool(false)];
        assert_eq!(apply(func(Aggregator::Count), &values), Value::Int(3));
        assert_eq!(apply(func(Aggregator::Sum), &values[..3]), Value::Null);
    }

    #[test]
    fn test_all_absent_group() {
        let values = cells(&[None, None]);
        assert_eq!(apply(func(Aggregator::Sum), &values), Value::Null);
        assert_eq!(apply(func(Aggregator::Count), &values), Value::Int(0));
    }

    #[test]
    fn test_population_std() {
        let values: Vec<Value> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .into_iter()
            .map(Value::Float)
            .collect();
        assert_eq!(apply(func(Aggregator::Std), &values), Value::Float(2.0));
        assert_eq!(apply(func(Aggregator::Var), &values), Value::Float(4.0));
    }

    #[test]
    fn test_resolve_defaults_column_to_name() {
        let resolved = spec(json!({"operator": "max"})).resolve("y", None).unwrap();
        assert_eq!(resolved.column, "y");
        assert_eq!(resolved.func.aggregator, Aggregator::Max);
    }

    #[test]
    fn test_resolve_missing_operator() {
        let err = spec(json!({})).resolve("y", None).unwrap_err();
        assert!(err.to_string().contains("Operator undefined"));

        let resolved = spec(json!({})).resolve("y", Some(Aggregator::Sum)).unwrap();
        assert_eq!(resolved.func.aggregator, Aggregator::Sum);
    }

    #[test]
    fn test_resolve_percentile_requires_q() {
        assert!(spec(json!({"operator": "percentile"})).resolve("p", None).is_err());
        assert!(
            spec(json!({"operator": "percentile", "options": {"q": 120}}))
                .resolve("p", None)
                .is_err()
        );
    }

    #[test]
    fn test_resolve_rejects_stray_options() {
        let err = spec(json!({"operator": "sum", "options": {"q": 5}}))
            .resolve("s", None)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported options: q"));
    }

    #[test]
    fn test_spec_rejects_unknown_keys() {
        assert!(serde_json::from_value::<AggregateSpec>(json!({"operatr": "sum"})).is_err());
    }
}
