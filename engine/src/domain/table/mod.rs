//! In-memory result tables
//!
//! A `Table` is a list of equally long named columns. Column names may be
//! hierarchical (pivot output produces `(metric, value)` names); all
//! operations addressing a column by a plain string match single-level names.

mod value;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub use value::{RowKey, Value};

use crate::domain::error::ValidationError;

/// Column name, one part for regular columns, several for pivoted ones
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnName(Vec<String>);

impl ColumnName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn hierarchical(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.0.len() == 1 && self.0[0] == name
    }

    /// Flat label used when rendering records
    pub fn label(&self) -> String {
        self.0.join(", ")
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            write!(f, "{}", self.0[0])
        } else {
            write!(f, "({})", self.0.join(", "))
        }
    }
}

impl From<&str> for ColumnName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ColumnName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: ColumnName,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<ColumnName>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Numeric view of the column; non-numeric cells are absent
    pub fn numeric(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }

    /// True when every present cell is numeric (and at least one is present)
    pub fn is_numeric(&self) -> bool {
        let mut seen = false;
        for v in &self.values {
            if v.is_null() {
                continue;
            }
            if !v.is_numeric() {
                return false;
            }
            seen = true;
        }
        seen
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns, rejecting ragged input
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ValidationError> {
        if let Some(first) = columns.first() {
            let len = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != len) {
                return Err(ValidationError::MalformedQuery(format!(
                    "column {} has {} rows, expected {}",
                    bad.name,
                    bad.values.len(),
                    len
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from JSON records. Column order follows first
    /// appearance of each key across the records.
    pub fn from_records(records: &[Map<String, JsonValue>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).map(Value::from_json).unwrap_or_default())
                    .collect();
                Column::new(name, values)
            })
            .collect();
        Self { columns }
    }

    /// Render as JSON records keyed by flattened column labels
    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        (0..self.num_rows())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.label(), c.values[row].to_json()))
                    .collect()
            })
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.is(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.is(name))
    }

    /// Column lookup that fails with a validation error naming the column
    pub fn require(&self, name: &str) -> Result<&Column, ValidationError> {
        self.column(name)
            .ok_or_else(|| ValidationError::missing_column(name))
    }

    /// Check every referenced column exists, reporting all missing ones
    pub fn require_all<'a, I>(&self, names: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            if self.column(name).is_none() && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns(missing))
        }
    }

    /// Overwrite a column in place when it exists, otherwise append it
    pub fn upsert_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert!(self.columns.is_empty() || values.len() == self.num_rows());
        match self.column_index(name) {
            Some(idx) => self.columns[idx].values = values,
            None => self.columns.push(Column::new(name, values)),
        }
    }

    pub fn push_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// New table holding the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Self { columns }
    }

    /// Rows `[offset, offset + limit)`; a limit of 0 means no limit
    pub fn slice(&self, offset: usize, limit: usize) -> Self {
        let end = if limit == 0 {
            self.num_rows()
        } else {
            offset.saturating_add(limit).min(self.num_rows())
        };
        let rows: Vec<usize> = (offset.min(end)..end).collect();
        self.take_rows(&rows)
    }
}
