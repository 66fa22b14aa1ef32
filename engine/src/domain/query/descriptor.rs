//! Canonical query representation and the normalizer that builds it

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue, json};

use super::date_parser::{HumanDelta, get_since_until, parse_human_delta};
use super::deprecated::{DeprecationWarning, MigrationTargets, migrate};
use super::metric::Metric;
use super::raw::{RawQuery, ResultType};
use crate::core::config::QueryConfig;
use crate::core::constants::{DEFAULT_TIME_RANGE_ENDPOINTS, DTTM_ALIAS};
use crate::data::source::{Datasource, DatasourceResolver};
use crate::domain::error::ValidationError;
use crate::domain::postprocessing::{PostProcessingStep, apply_post_processing, parse_steps};
use crate::domain::table::Table;
use crate::utils::time::datetime_to_millis;

const FORMULA_ANNOTATION: &str = "FORMULA";

/// A normalized, request-scoped query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub datasource: Option<Datasource>,
    pub result_type: Option<ResultType>,
    pub annotation_layers: Vec<Map<String, JsonValue>>,
    pub applied_time_extras: Map<String, JsonValue>,
    pub granularity: Option<String>,
    pub from_dttm: Option<DateTime<Utc>>,
    pub to_dttm: Option<DateTime<Utc>>,
    /// Raw expression, kept for cache keys
    pub time_range: Option<String>,
    /// Raw expression, kept for cache keys
    pub time_shift_expr: Option<String>,
    pub time_shift: Option<HumanDelta>,
    pub is_timeseries: bool,
    pub groupby: Vec<String>,
    pub columns: Vec<String>,
    pub metrics: Vec<Metric>,
    pub filter: Vec<JsonValue>,
    pub row_limit: u64,
    pub row_offset: u64,
    pub timeseries_limit: u64,
    pub timeseries_limit_metric: Option<JsonValue>,
    pub order_desc: bool,
    pub extras: Map<String, JsonValue>,
    pub orderby: Vec<(JsonValue, bool)>,
    pub post_processing: Vec<PostProcessingStep>,
    pub is_rowcount: bool,
    /// Deprecated-field warnings raised while normalizing
    pub deprecation_warnings: Vec<DeprecationWarning>,
}

impl QueryDescriptor {
    /// Labels of all metrics, ad-hoc ones included
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.label().to_string()).collect()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Report duplicate metric/column labels.
    ///
    /// With `raise_on_error` the error is returned as `Err`; otherwise it is
    /// handed back as `Ok(Some(_))` so callers can collect several.
    pub fn validate(&self, raise_on_error: bool) -> Result<Option<ValidationError>, ValidationError> {
        let mut labels = self.metric_names();
        labels.extend(self.column_names().iter().cloned());
        let duplicates = find_duplicates(&labels);
        if duplicates.is_empty() {
            return Ok(None);
        }
        let error = ValidationError::DuplicateLabels(duplicates);
        if raise_on_error {
            Err(error)
        } else {
            Ok(Some(error))
        }
    }

    /// The normalized field set handed to data sources and used for logging
    pub fn to_canonical_mapping(&self) -> Map<String, JsonValue> {
        let millis = |dt: &Option<DateTime<Utc>>| match dt {
            Some(dt) => json!(datetime_to_millis(dt)),
            None => JsonValue::Null,
        };
        let mut map = Map::new();
        map.insert("granularity".into(), json!(self.granularity));
        map.insert("groupby".into(), json!(self.groupby));
        map.insert("from_dttm".into(), millis(&self.from_dttm));
        map.insert("to_dttm".into(), millis(&self.to_dttm));
        map.insert("is_rowcount".into(), json!(self.is_rowcount));
        map.insert("is_timeseries".into(), json!(self.is_timeseries));
        map.insert(
            "metrics".into(),
            JsonValue::Array(self.metrics.iter().map(Metric::to_json).collect()),
        );
        map.insert("row_limit".into(), json!(self.row_limit));
        map.insert("row_offset".into(), json!(self.row_offset));
        map.insert("filter".into(), json!(self.filter));
        map.insert("timeseries_limit".into(), json!(self.timeseries_limit));
        map.insert(
            "timeseries_limit_metric".into(),
            json!(self.timeseries_limit_metric),
        );
        map.insert("order_desc".into(), json!(self.order_desc));
        map.insert("extras".into(), JsonValue::Object(self.extras.clone()));
        map.insert("columns".into(), json!(self.columns));
        map.insert("orderby".into(), json!(self.orderby));
        map
    }

    /// Run the post-processing steps over a result table
    pub fn apply_post_processing(&self, table: Table) -> Result<Table, ValidationError> {
        apply_post_processing(table, &self.post_processing)
    }
}

/// Duplicated labels in order of first occurrence
fn find_duplicates(labels: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut duplicates: Vec<String> = Vec::new();
    for label in labels {
        if counts[label.as_str()] > 1 && !duplicates.contains(label) {
            duplicates.push(label.clone());
        }
    }
    duplicates
}

// ============================================================================
// Normalizer
// ============================================================================

/// Builds `QueryDescriptor`s against one configuration and one captured "now"
pub struct QueryNormalizer<'a> {
    config: &'a QueryConfig,
    resolver: &'a dyn DatasourceResolver,
    now: DateTime<Utc>,
}

impl<'a> QueryNormalizer<'a> {
    pub fn new(config: &'a QueryConfig, resolver: &'a dyn DatasourceResolver) -> Self {
        Self {
            config,
            resolver,
            now: Utc::now(),
        }
    }

    /// Evaluate relative time expressions against a fixed instant
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn normalize_value(&self, raw: &JsonValue) -> Result<QueryDescriptor, ValidationError> {
        self.normalize(RawQuery::from_value(raw)?)
    }

    pub fn normalize(&self, raw: RawQuery) -> Result<QueryDescriptor, ValidationError> {
        let RawQuery {
            datasource,
            result_type,
            annotation_layers,
            applied_time_extras,
            granularity,
            metrics,
            groupby,
            filters,
            time_range,
            time_shift,
            is_timeseries,
            timeseries_limit,
            timeseries_limit_metric,
            row_limit,
            row_offset,
            order_desc,
            extras,
            columns,
            orderby,
            post_processing,
            is_rowcount,
            mut legacy,
        } = raw;

        let datasource = datasource
            .map(|r| {
                self.resolver
                    .resolve(&r.kind, r.id)
                    .ok_or(ValidationError::DatasourceNotFound {
                        kind: r.kind.clone(),
                        id: r.id,
                    })
            })
            .transpose()?;

        let annotation_layers = annotation_layers
            .unwrap_or_default()
            .into_iter()
            .filter(|layer| {
                layer.get("annotationType").and_then(JsonValue::as_str) != Some(FORMULA_ANNOTATION)
            })
            .collect();

        let mut extras = extras.unwrap_or_default();
        let relative_start = extras
            .get("relative_start")
            .and_then(JsonValue::as_str)
            .unwrap_or(self.config.relative_start_default.as_str())
            .to_string();
        let relative_end = extras
            .get("relative_end")
            .and_then(JsonValue::as_str)
            .unwrap_or(self.config.relative_end_default.as_str())
            .to_string();
        let (from_dttm, to_dttm) = get_since_until(
            time_range.as_deref(),
            time_shift.as_deref(),
            &relative_start,
            &relative_end,
            self.now,
        )?;

        let columns = columns.unwrap_or_default();
        let groupby = groupby.unwrap_or_default();
        let is_timeseries = is_timeseries.unwrap_or_else(|| {
            columns
                .iter()
                .chain(groupby.iter())
                .any(|c| c == DTTM_ALIAS)
        });

        let time_shift_expr = time_shift.filter(|s| !s.trim().is_empty());
        let time_shift = time_shift_expr
            .as_deref()
            .map(parse_human_delta)
            .transpose()?;

        let post_processing = parse_steps(&post_processing.unwrap_or_default())?;
        let metrics = metrics
            .unwrap_or_default()
            .iter()
            .map(Metric::normalize)
            .collect::<Result<Vec<_>, _>>()?;

        if self.config.sip15_enabled {
            let endpoints = match extras.get("time_range_endpoints") {
                Some(endpoints) if !endpoints.is_null() => endpoints.clone(),
                _ => json!(DEFAULT_TIME_RANGE_ENDPOINTS),
            };
            extras.insert("time_range_endpoints".into(), endpoints);
        }

        let mut granularity = granularity;
        let deprecation_warnings = migrate(
            &mut legacy,
            &mut MigrationTargets {
                granularity: &mut granularity,
                extras: &mut extras,
            },
        )?;
        if !legacy.is_empty() {
            let keys_str = legacy.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
            tracing::warn!(fields = %keys_str, "Unknown query fields ignored");
        }

        let descriptor = QueryDescriptor {
            datasource,
            result_type,
            annotation_layers,
            applied_time_extras: applied_time_extras.unwrap_or_default(),
            granularity,
            from_dttm,
            to_dttm,
            time_range,
            time_shift_expr,
            time_shift,
            is_timeseries,
            groupby,
            columns,
            metrics,
            filter: filters.unwrap_or_default(),
            row_limit: row_limit.unwrap_or(self.config.row_limit_default),
            row_offset: row_offset.unwrap_or(0),
            timeseries_limit: timeseries_limit.unwrap_or(0),
            timeseries_limit_metric,
            order_desc: order_desc.unwrap_or(true),
            extras,
            orderby: orderby.unwrap_or_default(),
            post_processing,
            is_rowcount: is_rowcount.unwrap_or(false),
            deprecation_warnings,
        };
        tracing::debug!(
            metrics = descriptor.metrics.len(),
            columns = descriptor.columns.len(),
            steps = descriptor.post_processing.len(),
            row_limit = descriptor.row_limit,
            "Normalized query"
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
