//! `cum`: running sum/product/min/max

use serde::Deserialize;

use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CumOperator {
    Sum,
    Prod,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CumOptions {
    pub columns: OrderedMap<String>,
    pub operator: CumOperator,
}

impl CumOptions {
    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        table.require_all(self.columns.keys())?;
        let computed: Vec<(&str, Vec<Value>)> = self
            .columns
            .iter()
            .map(|(source, dest)| {
                let values = table.require(source)?.numeric();
                Ok((dest.as_str(), self.running(&values)))
            })
            .collect::<Result<_, ValidationError>>()?;

        let mut out = table.clone();
        for (dest, values) in computed {
            out.upsert_column(dest, values);
        }
        Ok(out)
    }

    /// Absent cells stay absent and do not reset the accumulator
    fn running(&self, values: &[Option<f64>]) -> Vec<Value> {
        let mut acc: Option<f64> = None;
        values
            .iter()
            .map(|v| {
                let Some(v) = *v else {
                    return Value::Null;
                };
                let next = match (acc, self.operator) {
                    (None, _) => v,
                    (Some(a), CumOperator::Sum) => a + v,
                    (Some(a), CumOperator::Prod) => a * v,
                    (Some(a), CumOperator::Min) => a.min(v),
                    (Some(a), CumOperator::Max) => a.max(v),
                };
                acc = Some(next);
                Value::Float(next)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;
    use serde_json::json;

    fn run(operator: &str) -> Vec<Option<f64>> {
        let table = Table::from_columns(vec![Column::new(
            "y",
            vec![3.into(), 1.into(), Value::Null, 4.into()],
        )])
        .unwrap();
        let options: CumOptions =
            serde_json::from_value(json!({"columns": {"y": "c"}, "operator": operator})).unwrap();
        options.apply(&table).unwrap().column("c").unwrap().numeric()
    }

    #[test]
    fn test_operators() {
        assert_eq!(run("sum"), vec![Some(3.0), Some(4.0), None, Some(8.0)]);
        assert_eq!(run("prod"), vec![Some(3.0), Some(3.0), None, Some(12.0)]);
        assert_eq!(run("min"), vec![Some(3.0), Some(1.0), None, Some(1.0)]);
        assert_eq!(run("max"), vec![Some(3.0), Some(3.0), None, Some(4.0)]);
    }

    #[test]
    fn test_unknown_operator_rejected() {
        assert!(
            serde_json::from_value::<CumOptions>(json!({"columns": {}, "operator": "avg"}))
                .is_err()
        );
    }
}
