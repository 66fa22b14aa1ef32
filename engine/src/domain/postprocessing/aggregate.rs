//! `aggregate`: group by columns and reduce each group

use std::collections::BTreeMap;

use serde::Deserialize;

use super::aggregators::{AggregateSpec, NamedAggregate};
use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Column, RowKey, Table, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateOptions {
    #[serde(default)]
    pub groupby: Vec<String>,
    pub aggregates: OrderedMap<AggregateSpec>,
}

impl AggregateOptions {
    /// Resolve every aggregate; the operator is mandatory here
    pub fn resolve(&self) -> Result<Vec<NamedAggregate>, ValidationError> {
        self.aggregates
            .iter()
            .map(|(name, spec)| spec.resolve(name, None))
            .collect()
    }

    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        let aggregates = self.resolve()?;
        table.require_all(
            self.groupby
                .iter()
                .map(String::as_str)
                .chain(aggregates.iter().map(|a| a.column.as_str())),
        )?;

        let key_columns: Vec<&Column> = self
            .groupby
            .iter()
            .map(|name| table.require(name))
            .collect::<Result<_, _>>()?;
        let groups: BTreeMap<RowKey, Vec<usize>> = if key_columns.is_empty() {
            BTreeMap::from([(RowKey(Vec::new()), (0..table.num_rows()).collect())])
        } else {
            group_rows(&key_columns)
        };

        let mut out: Vec<Column> = self
            .groupby
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Column::new(
                    name.as_str(),
                    groups.keys().map(|key| key.0[i].clone()).collect(),
                )
            })
            .collect();

        for aggregate in &aggregates {
            let source = &table.require(&aggregate.column)?.values;
            let values = groups
                .values()
                .map(|rows| {
                    let cells: Vec<&Value> = rows.iter().map(|&r| &source[r]).collect();
                    aggregate.func.apply(&cells)
                })
                .collect();
            out.push(Column::new(aggregate.name.as_str(), values));
        }

        Table::from_columns(out)
    }
}

/// Row indices per distinct key, keys in ascending order. Rows with an
/// absent key cell are dropped.
pub(super) fn group_rows(key_columns: &[&Column]) -> BTreeMap<RowKey, Vec<usize>> {
    let num_rows = key_columns.first().map_or(0, |c| c.values.len());
    let mut groups: BTreeMap<RowKey, Vec<usize>> = BTreeMap::new();
    for row in 0..num_rows {
        let key: Vec<Value> = key_columns.iter().map(|c| c.values[row].clone()).collect();
        if key.iter().any(Value::is_null) {
            continue;
        }
        groups.entry(RowKey(key)).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> AggregateOptions {
        serde_json::from_value(value).unwrap()
    }

    fn sales() -> Table {
        Table::from_columns(vec![
            Column::new("region", vec!["west".into(), "east".into(), "west".into(), Value::Null]),
            Column::new("units", vec![3.into(), 5.into(), 4.into(), 100.into()]),
            Column::new("note", vec!["a".into(), "b".into(), "c".into(), "d".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn test_groups_sorted_and_ungrouped_columns_dropped() {
        let out = options(json!({
            "groupby": ["region"],
            "aggregates": {"total": {"column": "units", "operator": "sum"}}
        }))
        .apply(&sales())
        .unwrap();

        assert_eq!(out.column_names(), vec!["region", "total"]);
        assert_eq!(
            out.column("region").unwrap().values,
            vec![Value::from("east"), Value::from("west")]
        );
        assert_eq!(
            out.column("total").unwrap().values,
            vec![Value::Float(5.0), Value::Float(7.0)]
        );
    }

    #[test]
    fn test_no_groupby_reduces_whole_table() {
        let out = options(json!({
            "aggregates": {"units": {"operator": "max"}, "n": {"column": "note", "operator": "count"}}
        }))
        .apply(&sales())
        .unwrap();

        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column("units").unwrap().values, vec![Value::Float(100.0)]);
        assert_eq!(out.column("n").unwrap().values, vec![Value::Int(4)]);
    }

    #[test]
    fn test_count_over_string_column_per_group() {
        let table = Table::from_columns(vec![
            Column::new("g", vec!["a".into(), "a".into(), "b".into()]),
            Column::new("note", vec!["x".into(), Value::Null, "z".into()]),
        ])
        .unwrap();
        let out = options(json!({
            "groupby": ["g"],
            "aggregates": {"n": {"column": "note", "operator": "count"}}
        }))
        .apply(&table)
        .unwrap();
        assert_eq!(out.column("n").unwrap().values, vec![Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn test_empty_table_without_groupby() {
        let empty = Table::from_columns(vec![
            Column::new("units", Vec::new()),
            Column::new("note", Vec::new()),
        ])
        .unwrap();
        let out = options(json!({
            "aggregates": {
                "units": {"operator": "sum"},
                "n": {"column": "note", "operator": "count"}
            }
        }))
        .apply(&empty)
        .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column("units").unwrap().values, vec![Value::Null]);
        assert_eq!(out.column("n").unwrap().values, vec![Value::Int(0)]);
    }

    #[test]
    fn test_missing_column_named() {
        let err = options(json!({
            "groupby": ["country"],
            "aggregates": {"total": {"column": "units", "operator": "sum"}}
        }))
        .apply(&sales())
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingColumns(vec!["country".into()]));
    }

    #[test]
    fn test_operator_required() {
        let opts = options(json!({"aggregates": {"units": {}}}));
        assert!(matches!(
            opts.resolve(),
            Err(ValidationError::InvalidAggregator { .. })
        ));
    }
}
