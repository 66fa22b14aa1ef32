//! `select`: project and rename columns

use serde::Deserialize;

use super::options::OrderedMap;
use crate::domain::error::ValidationError;
use crate::domain::table::{Column, Table};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectOptions {
    /// Source column to output name, in output order
    pub columns: OrderedMap<String>,
}

impl SelectOptions {
    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        table.require_all(self.columns.keys())?;
        let columns = self
            .columns
            .iter()
            .map(|(source, dest)| {
                table
                    .require(source)
                    .map(|c| Column::new(dest.as_str(), c.values.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Table::from_columns(columns)
    }
}
