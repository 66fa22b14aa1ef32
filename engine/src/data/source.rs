//! Data source collaborators
//!
//! A `DataSource` executes a normalized query and hands back a result table;
//! a `DatasourceResolver` maps a `(type, id)` reference to the datasource
//! whose uid ends up in cache keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::domain::query::QueryDescriptor;
use crate::domain::table::Table;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryExecutionError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Malformed result set: {0}")]
    Malformed(String),

    #[error("Query execution failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn execute(&self, query: &QueryDescriptor) -> Result<Table, QueryExecutionError>;

    fn name(&self) -> &'static str;
}

/// Apply `row_offset`/`row_limit` to an already materialized result
fn limit_rows(table: Table, query: &QueryDescriptor) -> Table {
    let offset = usize::try_from(query.row_offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(query.row_limit).unwrap_or(usize::MAX);
    if offset == 0 && (limit == 0 || limit >= table.num_rows()) {
        return table;
    }
    table.slice(offset, limit)
}

// ============================================================================
// JSON records file
// ============================================================================

/// Serves a JSON array of records from disk as the query result
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn execute(&self, query: &QueryDescriptor) -> Result<Table, QueryExecutionError> {
        let path = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| QueryExecutionError::Read {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let records: Vec<Map<String, JsonValue>> = serde_json::from_str(&content)
            .map_err(|e| QueryExecutionError::Malformed(format!("{}: {}", path, e)))?;
        tracing::debug!(path = %path, rows = records.len(), "Loaded records");
        Ok(limit_rows(Table::from_records(&records), query))
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

// ============================================================================
// In-memory table
// ============================================================================

/// Serves a fixed table and counts executions
#[derive(Debug, Default)]
pub struct InMemorySource {
    table: Table,
    executions: AtomicUsize,
}

impl InMemorySource {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn execute(&self, query: &QueryDescriptor) -> Result<Table, QueryExecutionError> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        Ok(limit_rows(self.table.clone(), query))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Datasource resolution
// ============================================================================

/// A resolved datasource handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    pub name: String,
}

impl Datasource {
    /// Opaque identifier used in cache keys, `{id}__{type}`
    pub fn uid(&self) -> String {
        format!("{}__{}", self.id, self.kind)
    }
}

pub trait DatasourceResolver: Send + Sync {
    fn resolve(&self, kind: &str, id: i64) -> Option<Datasource>;
}

/// Resolver over a fixed set of datasources
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    datasources: HashMap<(String, i64), Datasource>,
}

impl StaticResolver {
    pub fn with(mut self, datasource: Datasource) -> Self {
        self.datasources
            .insert((datasource.kind.clone(), datasource.id), datasource);
        self
    }

    pub fn with_table(self, id: i64, name: &str) -> Self {
        self.with(Datasource {
            kind: "table".into(),
            id,
            name: name.into(),
        })
    }
}

impl FromIterator<Datasource> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = Datasource>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::with)
    }
}

impl DatasourceResolver for StaticResolver {
    fn resolve(&self, kind: &str, id: i64) -> Option<Datasource> {
        self.datasources.get(&(kind.to_string(), id)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::core::config::QueryConfig;
    use crate::domain::query::QueryNormalizer;
    use crate::domain::table::Value;
    use serde_json::json;

    fn query(raw: JsonValue) -> QueryDescriptor {
        let config = QueryConfig::default();
        let resolver = StaticResolver::default();
        QueryNormalizer::new(&config, &resolver)
            .normalize_value(&raw)
            .unwrap()
    }

    fn records_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_json_file_source_reads_records() {
        let file = records_file(r#"[{"name": "a", "num": 1}, {"name": "b", "num": 2}]"#);
        let source = JsonFileSource::new(file.path());
        let table = source.execute(&query(json!({}))).await.unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names(), vec!["name", "num"]);
        assert_eq!(table.column("num").unwrap().values[1], Value::Int(2));
    }

    #[tokio::test]
    async fn test_row_limit_and_offset_applied() {
        let file = records_file(r#"[{"n": 1}, {"n": 2}, {"n": 3}, {"n": 4}]"#);
        let source = JsonFileSource::new(file.path());
        let table = source
            .execute(&query(json!({"row_limit": 2, "row_offset": 1})))
            .await
            .unwrap();
        assert_eq!(
            table.column("n").unwrap().numeric(),
            vec![Some(2.0), Some(3.0)]
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = JsonFileSource::new("/nonexistent/records.json");
        let err = source.execute(&query(json!({}))).await.unwrap_err();
        assert!(matches!(err, QueryExecutionError::Read { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let file = records_file(r#"{"not": "an array"}"#);
        let err = JsonFileSource::new(file.path())
            .execute(&query(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryExecutionError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_in_memory_source_counts_executions() {
        let source = InMemorySource::new(Table::default());
        source.execute(&query(json!({}))).await.unwrap();
        source.execute(&query(json!({}))).await.unwrap();
        assert_eq!(source.executions(), 2);
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticResolver::default().with_table(1, "birth_names");
        let ds = resolver.resolve("table", 1).unwrap();
        assert_eq!(ds.uid(), "1__table");
        assert_eq!(ds.name, "birth_names");
        assert!(resolver.resolve("druid", 1).is_none());
        assert!(resolver.resolve("table", 2).is_none());
    }

    #[test]
    fn test_resolver_from_config_entries() {
        let entries: Vec<Datasource> =
            serde_json::from_value(json!([{"type": "table", "id": 3, "name": "flights"}])).unwrap();
        let resolver: StaticResolver = entries.into_iter().collect();
        assert_eq!(resolver.resolve("table", 3).unwrap().name, "flights");
    }
}
