//! Chart data service
//!
//! Ties a normalized query to a data source and the cache: look the payload
//! up by the query's cache key, otherwise execute, post-process and store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use thiserror::Error;

use crate::data::cache::{CacheKey, CacheService};
use crate::data::source::{DataSource, QueryExecutionError};
use crate::domain::error::ValidationError;
use crate::domain::query::{QueryDescriptor, ResultType};
use crate::domain::table::Table;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartDataError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] QueryExecutionError),

    #[error("Result type {0} is not supported")]
    UnsupportedResultType(ResultType),
}

/// Rows as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedRows {
    rowcount: usize,
    data: Vec<Map<String, JsonValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub cache_key: Option<String>,
    pub is_cached: bool,
    pub cached_dttm: Option<DateTime<Utc>>,
    pub rowcount: usize,
    pub data: Vec<Map<String, JsonValue>>,
    /// Canonical query mapping, only for `result_type = query`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, JsonValue>>,
}

pub struct ChartDataService {
    source: Arc<dyn DataSource>,
    cache: Option<Arc<CacheService>>,
}

impl ChartDataService {
    pub fn new(source: Arc<dyn DataSource>, cache: Option<Arc<CacheService>>) -> Self {
        Self { source, cache }
    }

    /// Produce the payload for one query; `force` skips the cache read
    pub async fn get_payload(
        &self,
        query: &QueryDescriptor,
        force: bool,
    ) -> Result<ChartPayload, ChartDataError> {
        query.validate(true)?;

        let result_type = query.result_type.unwrap_or(ResultType::Full);
        match result_type {
            ResultType::Query => {
                return Ok(ChartPayload {
                    cache_key: None,
                    is_cached: false,
                    cached_dttm: None,
                    rowcount: 0,
                    data: Vec::new(),
                    query: Some(query.to_canonical_mapping()),
                });
            }
            ResultType::Timegrains => {
                return Err(ChartDataError::UnsupportedResultType(result_type));
            }
            ResultType::Full | ResultType::Results | ResultType::Samples => {}
        }

        let cache_key = CacheKey::chart_data(&query.cache_key(&Map::new()));

        if !force
            && let Some(cache) = &self.cache
            && let Some(hit) = cache.get_cached::<CachedRows>(&cache_key).await
        {
            tracing::debug!(key = %cache_key, "Serving chart data from cache");
            return Ok(ChartPayload {
                cache_key: Some(cache_key),
                is_cached: true,
                cached_dttm: Some(hit.cached_dttm),
                rowcount: hit.value.rowcount,
                data: hit.value.data,
                query: None,
            });
        }

        let table = self.source.execute(query).await?;
        tracing::debug!(
            source = self.source.name(),
            rows = table.num_rows(),
            "Executed query"
        );
        let table = if result_type == ResultType::Samples {
            table
        } else {
            query.apply_post_processing(table)?
        };
        let rows = to_cached_rows(&table, query.is_rowcount);

        let mut cached_dttm = None;
        if let Some(cache) = &self.cache
            && cache.set_and_log(&cache_key, &rows, None).await
        {
            cached_dttm = Some(Utc::now());
        }

        Ok(ChartPayload {
            cache_key: Some(cache_key),
            is_cached: false,
            cached_dttm,
            rowcount: rows.rowcount,
            data: rows.data,
            query: None,
        })
    }
}

fn to_cached_rows(table: &Table, is_rowcount: bool) -> CachedRows {
    if is_rowcount {
        let mut row = Map::new();
        row.insert("rowcount".into(), json!(table.num_rows()));
        return CachedRows {
            rowcount: 1,
            data: vec![row],
        };
    }
    CachedRows {
        rowcount: table.num_rows(),
        data: table.to_records(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::QueryConfig;
    use crate::data::cache::testing::{failing_service, memory_service};
    use crate::data::source::{InMemorySource, StaticResolver};
    use crate::domain::query::QueryNormalizer;
    use crate::domain::table::{Column, Value};

    fn source() -> Arc<InMemorySource> {
        let table = Table::from_columns(vec![
            Column::new(
                "name",
                vec![Value::from("a"), Value::from("b"), Value::from("a")],
            ),
            Column::new(
                "num",
                vec![Value::Int(1), Value::Int(2), Value::Int(3)],
            ),
        ])
        .unwrap();
        Arc::new(InMemorySource::new(table))
    }

    fn normalize(raw: JsonValue) -> QueryDescriptor {
        let config = QueryConfig::default();
        let resolver = StaticResolver::default().with_table(1, "birth_names");
        QueryNormalizer::new(&config, &resolver)
            .normalize_value(&raw)
            .unwrap()
    }

    fn service(source: &Arc<InMemorySource>, cache: Option<CacheService>) -> ChartDataService {
        ChartDataService::new(source.clone(), cache.map(Arc::new))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let src = source();
        let svc = service(&src, Some(memory_service()));
        let query = normalize(json!({"columns": ["name", "num"]}));

        let first = svc.get_payload(&query, false).await.unwrap();
        assert!(!first.is_cached);
        assert_eq!(first.rowcount, 3);
        assert!(first.cached_dttm.is_some());

        let second = svc.get_payload(&query, false).await.unwrap();
        assert!(second.is_cached);
        assert_eq!(second.cache_key, first.cache_key);
        assert_eq!(second.data, first.data);
        assert_eq!(src.executions(), 1);
    }

    #[tokio::test]
    async fn test_force_bypasses_cache() {
        let src = source();
        let svc = service(&src, Some(memory_service()));
        let query = normalize(json!({"columns": ["name"]}));

        svc.get_payload(&query, false).await.unwrap();
        let forced = svc.get_payload(&query, true).await.unwrap();
        assert!(!forced.is_cached);
        assert_eq!(src.executions(), 2);
    }

    #[tokio::test]
    async fn test_cache_failure_degrades_to_miss() {
        let src = source();
        let svc = service(&src, Some(failing_service()));
        let query = normalize(json!({"columns": ["name"]}));

        let payload = svc.get_payload(&query, false).await.unwrap();
        assert!(!payload.is_cached);
        assert!(payload.cached_dttm.is_none());
        assert_eq!(payload.rowcount, 3);

        svc.get_payload(&query, false).await.unwrap();
        assert_eq!(src.executions(), 2);
    }

    #[tokio::test]
    async fn test_post_processing_applied() {
        let src = source();
        let svc = service(&src, None);
        let query = normalize(json!({
            "columns": ["name", "num"],
            "post_processing": [
                {"operation": "sort", "options": {"columns": {"num": false}}}
            ]
        }));
        let payload = svc.get_payload(&query, false).await.unwrap();
        assert_eq!(payload.data[0]["num"], json!(3));
        assert!(payload.cache_key.is_some());
        assert!(payload.cached_dttm.is_none());
    }

    #[tokio::test]
    async fn test_samples_skip_post_processing() {
        let src = source();
        let svc = service(&src, None);
        let query = normalize(json!({
            "result_type": "samples",
            "post_processing": [
                {"operation": "sort", "options": {"columns": {"num": false}}}
            ]
        }));
        let payload = svc.get_payload(&query, false).await.unwrap();
        assert_eq!(payload.data[0]["num"], json!(1));
    }

    #[tokio::test]
    async fn test_query_result_type_does_not_execute() {
        let src = source();
        let svc = service(&src, Some(memory_service()));
        let query = normalize(json!({"result_type": "query", "row_limit": 7}));
        let payload = svc.get_payload(&query, false).await.unwrap();
        assert_eq!(payload.query.unwrap()["row_limit"], json!(7));
        assert!(payload.cache_key.is_none());
        assert_eq!(src.executions(), 0);
    }

    #[tokio::test]
    async fn test_rowcount_query() {
        let src = source();
        let svc = service(&src, None);
        let query = normalize(json!({"is_rowcount": true}));
        let payload = svc.get_payload(&query, false).await.unwrap();
        assert_eq!(payload.rowcount, 1);
        assert_eq!(payload.data[0]["rowcount"], json!(3));
    }

    #[tokio::test]
    async fn test_duplicate_labels_rejected_before_execution() {
        let src = source();
        let svc = service(&src, None);
        let query = normalize(json!({"metrics": ["num"], "columns": ["num"]}));
        let err = svc.get_payload(&query, false).await.unwrap_err();
        assert!(matches!(
            err,
            ChartDataError::Validation(ValidationError::DuplicateLabels(_))
        ));
        assert_eq!(src.executions(), 0);
    }

    #[tokio::test]
    async fn test_missing_column_in_transform() {
        let src = source();
        let svc = service(&src, None);
        let query = normalize(json!({
            "post_processing": [
                {"operation": "sort", "options": {"columns": {"missing": true}}}
            ]
        }));
        let err = svc.get_payload(&query, false).await.unwrap_err();
        assert!(matches!(
            err,
            ChartDataError::Validation(ValidationError::MissingColumns(_))
        ));
    }
}
