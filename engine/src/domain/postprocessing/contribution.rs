//! `contribution`: each cell as a share of its column or row total

use serde::Deserialize;

use crate::core::constants::DTTM_ALIAS;
use crate::domain::error::ValidationError;
use crate::domain::table::{Table, Value};

const OPERATION: &str = "contribution";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Column,
    Row,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContributionOptions {
    #[serde(default)]
    pub orientation: Orientation,
    /// Columns to normalize; defaults to every numeric column
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Output names for `columns`; results overwrite in place when unset
    #[serde(default)]
    pub rename_columns: Option<Vec<String>>,
}

impl ContributionOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (&self.columns, &self.rename_columns) {
            (None, Some(_)) => Err(ValidationError::invalid_options(
                OPERATION,
                "rename_columns requires columns",
            )),
            (Some(columns), Some(renames)) if columns.len() != renames.len() => {
                Err(ValidationError::invalid_options(
                    OPERATION,
                    "`rename_columns` must have the same length as `columns`",
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Table, ValidationError> {
        self.validate()?;
        let targets: Vec<String> = match &self.columns {
            Some(columns) => {
                table.require_all(columns.iter().map(String::as_str))?;
                columns.clone()
            }
            None => table
                .columns()
                .iter()
                .filter(|c| c.name.parts().len() == 1 && !c.name.is(DTTM_ALIAS) && c.is_numeric())
                .map(|c| c.name.to_string())
                .collect(),
        };

        let series: Vec<Vec<Option<f64>>> = targets
            .iter()
            .map(|name| table.require(name).map(|c| c.numeric()))
            .collect::<Result<_, _>>()?;

        let shares: Vec<Vec<Value>> = match self.orientation {
            Orientation::Column => series
                .iter()
                .map(|values| {
                    let total: f64 = values.iter().flatten().sum();
                    values.iter().map(|v| share(*v, total)).collect()
                })
                .collect(),
            Orientation::Row => {
                let row_totals: Vec<f64> = (0..table.num_rows())
                    .map(|row| series.iter().filter_map(|values| values[row]).sum())
                    .collect();
                series
                    .iter()
                    .map(|values| {
                        values
                            .iter()
                            .zip(&row_totals)
                            .map(|(v, total)| share(*v, *total))
                            .collect()
                    })
                    .collect()
            }
        };

        let names = self.rename_columns.as_ref().unwrap_or(&targets);
        let mut out = table.clone();
        for (name, values) in names.iter().zip(shares) {
            out.upsert_column(name, values);
        }
        Ok(out)
    }
}

fn share(value: Option<f64>, total: f64) -> Value {
    if total == 0.0 {
        return Value::Null;
    }
    Value::from_f64(value.map(|v| v / total))
}
