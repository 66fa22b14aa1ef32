//! Bundled models

use serde::{Deserialize, Serialize};

use super::model::{FieldSetter, Model, expect_bool, expect_optional_string, expect_string};

/// A registered database connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseModel {
    pub id: Option<i64>,
    pub database_name: String,
    pub sqlalchemy_uri: String,
    pub expose_in_sqllab: bool,
    pub allow_ctas: bool,
    pub allow_cvas: bool,
    pub allow_dml: bool,
    pub allow_run_async: bool,
    pub allow_csv_upload: bool,
    pub allow_multi_schema_metadata_fetch: bool,
    pub force_ctas_schema: Option<String>,
}

const DATABASE_SETTERS: &[(&str, FieldSetter<DatabaseModel>)] = &[
    ("database_name", |m, v| {
        m.database_name = expect_string(v)?;
        Ok(())
    }),
    ("sqlalchemy_uri", |m, v| {
        m.sqlalchemy_uri = expect_string(v)?;
        Ok(())
    }),
    ("expose_in_sqllab", |m, v| {
        m.expose_in_sqllab = expect_bool(v)?;
        Ok(())
    }),
    ("allow_ctas", |m, v| {
        m.allow_ctas = expect_bool(v)?;
        Ok(())
    }),
    ("allow_cvas", |m, v| {
        m.allow_cvas = expect_bool(v)?;
        Ok(())
    }),
    ("allow_dml", |m, v| {
        m.allow_dml = expect_bool(v)?;
        Ok(())
    }),
    ("allow_run_async", |m, v| {
        m.allow_run_async = expect_bool(v)?;
        Ok(())
    }),
    ("allow_csv_upload", |m, v| {
        m.allow_csv_upload = expect_bool(v)?;
        Ok(())
    }),
    ("allow_multi_schema_metadata_fetch", |m, v| {
        m.allow_multi_schema_metadata_fetch = expect_bool(v)?;
        Ok(())
    }),
    ("force_ctas_schema", |m, v| {
        m.force_ctas_schema = expect_optional_string(v)?;
        Ok(())
    }),
];

impl Model for DatabaseModel {
    const KIND: &'static str = "database";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn field_setters() -> &'static [(&'static str, FieldSetter<Self>)] {
        DATABASE_SETTERS
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("database_name", self.database_name.clone())]
    }
}
