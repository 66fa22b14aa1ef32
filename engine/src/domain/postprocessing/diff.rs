//! `diff`: difference against a lagged (or leading) row

use serde::Deserialize;

use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Table, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffOptions {
    /// Source column to destination column
    pub columns: OrderedMap<String>,
    /// Positive looks back, negative looks ahead
    #[serde(default = "default_periods")]
    pub periods: i64,
}

fn default_periods() -> i64 {
    1
}

impl DiffOptions {
    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        table.require_all(self.columns.keys())?;
        let computed: Vec<(&str, Vec<Value>)> = self
            .columns
            .iter()
            .map(|(source, dest)| {
                let values = table.require(source)?.numeric();
                Ok((dest.as_str(), diff(&values, self.periods)))
            })
            .collect::<Result<_, ValidationError>>()?;

        let mut out = table.clone();
        for (dest, values) in computed {
            out.upsert_column(dest, values);
        }
        Ok(out)
    }
}

/// `values[i] - values[i - periods]`, absent when out of range
fn diff(values: &[Option<f64>], periods: i64) -> Vec<Value> {
    let len = values.len() as i64;
    (0..len)
        .map(|i| {
            let j = i - periods;
            if !(0..len).contains(&j) {
                return Value::Null;
            }
            let current = values[i as usize];
            let other = values[j as usize];
            Value::from_f64(current.zip(other).map(|(a, b)| a - b))
        })
        .collect()
}
