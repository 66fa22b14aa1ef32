//! `pivot`: reshape long data into one column per (aggregate, pivot value)

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::aggregate::group_rows;
use super::aggregators::{AggregateSpec, Aggregator, NamedAggregate};
use super::options::{OrderedMap, default_true};
use crate::domain::error::ValidationError;
use crate::domain::table::{Column, ColumnName, RowKey, Table, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PivotOptions {
    pub index: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub aggregates: OrderedMap<AggregateSpec>,
    /// Value for (index, pivot value) cells with no data
    #[serde(default)]
    pub metric_fill_value: Option<JsonValue>,
    /// Value substituted for absent pivot column cells
    #[serde(default)]
    pub column_fill_value: Option<String>,
    /// Drop output columns with no present value (before filling)
    #[serde(default = "default_true")]
    pub drop_missing_columns: bool,
    /// Name columns `(value..., metric)` instead of `(metric, value...)`
    #[serde(default)]
    pub combine_value_with_metric: bool,
}

impl PivotOptions {
    /// Resolve aggregates, defaulting missing operators to sum
    pub fn resolve(&self) -> Result<Vec<NamedAggregate>, ValidationError> {
        if self.index.is_empty() {
            return Err(ValidationError::InvalidPostProcessing(
                "Pivot operation requires at least one index".into(),
            ));
        }
        if self.aggregates.is_empty() {
            return Err(ValidationError::InvalidPostProcessing(
                "Pivot operation must include at least one aggregate".into(),
            ));
        }
        self.aggregates
            .iter()
            .map(|(name, spec)| spec.resolve(name, Some(Aggregator::Sum)))
            .collect()
    }

    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        let aggregates = self.resolve()?;
        table.require_all(
            self.index
                .iter()
                .chain(self.columns.iter())
                .map(String::as_str)
                .chain(aggregates.iter().map(|a| a.column.as_str())),
        )?;

        let index_columns: Vec<&Column> = self
            .index
            .iter()
            .map(|name| table.require(name))
            .collect::<Result<_, _>>()?;
        let pivot_columns: Vec<&Column> = self
            .columns
            .iter()
            .map(|name| table.require(name))
            .collect::<Result<_, _>>()?;

        let fill = self.column_fill_value.as_deref().map(Value::from);
        let pivot_key = |row: usize| -> Option<RowKey> {
            let mut key = Vec::with_capacity(pivot_columns.len());
            for column in &pivot_columns {
                let cell = &column.values[row];
                match (&fill, cell.is_null()) {
                    (_, false) => key.push(cell.clone()),
                    (Some(fill), true) => key.push(fill.clone()),
                    (None, true) => return None,
                }
            }
            Some(RowKey(key))
        };

        // index key -> pivot key -> rows
        let mut cells: BTreeMap<RowKey, BTreeMap<RowKey, Vec<usize>>> = BTreeMap::new();
        let mut pivot_keys: BTreeSet<RowKey> = BTreeSet::new();
        for (index_key, rows) in group_rows(&index_columns) {
            let by_pivot = cells.entry(index_key).or_default();
            for row in rows {
                if let Some(key) = pivot_key(row) {
                    pivot_keys.insert(key.clone());
                    by_pivot.entry(key).or_default().push(row);
                }
            }
        }

        let mut out: Vec<Column> = self
            .index
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Column::new(
                    name.as_str(),
                    cells.keys().map(|key| key.0[i].clone()).collect(),
                )
            })
            .collect();

        let sources: Vec<&Vec<Value>> = aggregates
            .iter()
            .map(|a| table.require(&a.column).map(|c| &c.values))
            .collect::<Result<_, _>>()?;

        let mut combos: Vec<(usize, &RowKey)> = Vec::new();
        if self.combine_value_with_metric {
            for key in &pivot_keys {
                combos.extend((0..aggregates.len()).map(|a| (a, key)));
            }
        } else {
            for a in 0..aggregates.len() {
                combos.extend(pivot_keys.iter().map(|key| (a, key)));
            }
        }

        let metric_fill = self.metric_fill_value.as_ref().map(Value::from_json);
        for (a, key) in combos {
            let aggregate = &aggregates[a];
            let mut values: Vec<Value> = cells
                .values()
                .map(|by_pivot| match by_pivot.get(key) {
                    Some(rows) => {
                        let group: Vec<&Value> = rows.iter().map(|&r| &sources[a][r]).collect();
                        aggregate.func.apply(&group)
                    }
                    None => Value::Null,
                })
                .collect();

            if self.drop_missing_columns && values.iter().all(Value::is_null) {
                continue;
            }
            if let Some(fill) = &metric_fill {
                for value in values.iter_mut().filter(|v| v.is_null()) {
                    *value = fill.clone();
                }
            }
            out.push(Column {
                name: self.output_name(&aggregate.name, key),
                values,
            });
        }

        Table::from_columns(out)
    }

    fn output_name(&self, metric: &str, key: &RowKey) -> ColumnName {
        if self.columns.is_empty() {
            return ColumnName::new(metric);
        }
        let values = key.0.iter().map(Value::to_string);
        let parts = if self.combine_value_with_metric {
            values.chain(std::iter::once(metric.to_string())).collect()
        } else {
            std::iter::once(metric.to_string()).chain(values).collect()
        };
        ColumnName::hierarchical(parts)
    }
}

#[cfg(test)]
#[path = "pivot_tests.rs"]
mod tests;
