//! `sort`: stable multi-key row sort

use std::cmp::Ordering;

use serde::Deserialize;

use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Table, Value};

/// `columns` maps column name to ascending flag; earlier keys take priority
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortOptions {
    pub columns: OrderedMap<bool>,
}

impl SortOptions {
    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        table.require_all(self.columns.keys())?;
        let keys: Vec<(&[Value], bool)> = self
            .columns
            .iter()
            .map(|(name, ascending)| {
                table
                    .require(name)
                    .map(|c| (c.values.as_slice(), *ascending))
            })
            .collect::<Result<_, _>>()?;

        let mut rows: Vec<usize> = (0..table.num_rows()).collect();
        rows.sort_by(|&a, &b| {
            for (values, ascending) in &keys {
                let ord = compare(&values[a], &values[b], *ascending);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(table.take_rows(&rows))
    }
}

/// Absent values go last in either direction
fn compare(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ if ascending => a.total_cmp(b),
        _ => b.total_cmp(a),
    }
}
