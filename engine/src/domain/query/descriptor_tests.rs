use super::*;
use crate::data::source::StaticResolver;
use crate::domain::query::TimeUnit;
use crate::domain::table::{Column, Value};
use crate::utils::time::parse_iso_datetime;

fn now() -> DateTime<Utc> {
    parse_iso_datetime("2024-03-15T10:30:00Z").unwrap()
}

fn normalize_with(config: &QueryConfig, raw: JsonValue) -> Result<QueryDescriptor, ValidationError> {
    let resolver = StaticResolver::default().with_table(3, "birth_names");
    QueryNormalizer::new(config, &resolver)
        .at(now())
        .normalize_value(&raw)
}

fn normalize(raw: JsonValue) -> QueryDescriptor {
    normalize_with(&QueryConfig::default(), raw).unwrap()
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_empty_request_defaults() {
    let query = normalize(json!({}));
    assert_eq!(query.row_limit, 50_000);
    assert_eq!(query.row_offset, 0);
    assert_eq!(query.timeseries_limit, 0);
    assert!(query.order_desc);
    assert!(!query.is_timeseries);
    assert!(!query.is_rowcount);
    assert!(query.metrics.is_empty());
    assert!(query.post_processing.is_empty());
    assert_eq!(query.from_dttm, None);
    assert_eq!(query.to_dttm, None);
    assert!(query.datasource.is_none());
}

#[test]
fn test_row_limit_zero_is_kept() {
    assert_eq!(normalize(json!({"row_limit": 0})).row_limit, 0);
}

#[test]
fn test_row_limit_default_from_config() {
    let config = QueryConfig {
        row_limit_default: 100,
        ..QueryConfig::default()
    };
    assert_eq!(normalize_with(&config, json!({})).unwrap().row_limit, 100);
}

#[test]
fn test_is_timeseries_inferred_from_dimensions() {
    assert!(normalize(json!({"groupby": [DTTM_ALIAS]})).is_timeseries);
    assert!(normalize(json!({"columns": ["a", DTTM_ALIAS]})).is_timeseries);
    assert!(!normalize(json!({"columns": ["a"]})).is_timeseries);
    assert!(!normalize(json!({"groupby": [DTTM_ALIAS], "is_timeseries": false})).is_timeseries);
}

// ============================================================================
// Time range
// ============================================================================

#[test]
fn test_time_range_resolved_against_now() {
    let query = normalize(json!({"time_range": "Last week"}));
    assert_eq!(query.from_dttm, parse_iso_datetime("2024-03-08"));
    assert_eq!(query.to_dttm, parse_iso_datetime("2024-03-15"));
    assert_eq!(query.time_range.as_deref(), Some("Last week"));
}

#[test]
fn test_relative_anchors_from_extras() {
    let query = normalize(json!({
        "time_range": "Last day",
        "extras": {"relative_start": "now", "relative_end": "now"}
    }));
    assert_eq!(query.from_dttm, parse_iso_datetime("2024-03-14T10:30:00Z"));
    assert_eq!(query.to_dttm, Some(now()));
}

#[test]
fn test_relative_anchors_from_config() {
    let config = QueryConfig {
        relative_start_default: "now".into(),
        relative_end_default: "now".into(),
        ..QueryConfig::default()
    };
    let query = normalize_with(&config, json!({"time_range": "Last day"})).unwrap();
    assert_eq!(query.to_dttm, Some(now()));
}

#[test]
fn test_time_shift_parsed() {
    let query = normalize(json!({"time_range": "Last week", "time_shift": "1 week ago"}));
    assert_eq!(query.time_shift, Some(HumanDelta::new(-1, TimeUnit::Week)));
    assert_eq!(query.time_shift_expr.as_deref(), Some("1 week ago"));
    assert_eq!(query.to_dttm, parse_iso_datetime("2024-03-08"));
}

#[test]
fn test_bad_time_range_fails_before_execution() {
    let err = normalize_with(&QueryConfig::default(), json!({"time_range": "someday : never"}))
        .unwrap_err();
    assert!(matches!(err, ValidationError::TimeParse(_)));
}

// ============================================================================
// Metrics, annotations, post-processing
// ============================================================================

#[test]
fn test_metric_shapes_normalized() {
    let query = normalize(json!({
        "metrics": [
            "revenue",
            {"label": "cnt"},
            {"expressionType": "SQL", "sqlExpression": "1"}
        ]
    }));
    assert_eq!(query.metrics[0], Metric::Named("revenue".into()));
    assert_eq!(query.metrics[1], Metric::Named("cnt".into()));
    assert!(query.metrics[2].is_adhoc());
    assert_eq!(query.metric_names(), vec!["revenue", "cnt", "1"]);
}

#[test]
fn test_formula_annotations_dropped() {
    let query = normalize(json!({
        "annotation_layers": [
            {"annotationType": "FORMULA", "value": "x"},
            {"annotationType": "EVENT", "name": "deploys"}
        ]
    }));
    assert_eq!(query.annotation_layers.len(), 1);
    assert_eq!(query.annotation_layers[0]["name"], json!("deploys"));
}

#[test]
fn test_unknown_post_processing_rejected_at_construction() {
    let err = normalize_with(
        &QueryConfig::default(),
        json!({"post_processing": [{"operation": "explode"}]}),
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::UnknownOperation("explode".into()));
}

#[test]
fn test_apply_post_processing() {
    let query = normalize(json!({
        "post_processing": [
            {"operation": "rolling", "options": {"columns": {"y": "y2"}, "rolling_type": "cumsum", "window": 0}}
        ]
    }));
    let table = Table::from_columns(vec![Column::new(
        "y",
        vec![1.into(), 2.into(), 3.into(), 4.into()],
    )])
    .unwrap();
    let out = query.apply_post_processing(table).unwrap();
    assert_eq!(
        out.column("y2").unwrap().numeric(),
        vec![Some(1.0), Some(3.0), Some(6.0), Some(10.0)]
    );
    assert_eq!(out.column("y").unwrap().values[0], Value::Int(1));
}

// ============================================================================
// Datasource, SIP-15, deprecated fields
// ============================================================================

#[test]
fn test_datasource_resolved() {
    let query = normalize(json!({"datasource": {"id": 3, "type": "table"}}));
    assert_eq!(query.datasource.unwrap().uid(), "3__table");
}

#[test]
fn test_unknown_datasource_rejected() {
    let err = normalize_with(
        &QueryConfig::default(),
        json!({"datasource": {"id": 99, "type": "table"}}),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ValidationError::DatasourceNotFound {
            kind: "table".into(),
            id: 99
        }
    );
}

#[test]
fn test_sip15_endpoints() {
    let config = QueryConfig {
        sip15_enabled: true,
        ..QueryConfig::default()
    };
    let query = normalize_with(&config, json!({})).unwrap();
    assert_eq!(
        query.extras["time_range_endpoints"],
        json!(["inclusive", "exclusive"])
    );

    let query = normalize_with(
        &config,
        json!({"extras": {"time_range_endpoints": ["inclusive", "inclusive"]}}),
    )
    .unwrap();
    assert_eq!(
        query.extras["time_range_endpoints"],
        json!(["inclusive", "inclusive"])
    );

    assert!(!normalize(json!({})).extras.contains_key("time_range_endpoints"));
}

#[test]
fn test_granularity_sqla_migrated() {
    let query = normalize(json!({"granularity_sqla": "ds"}));
    assert_eq!(query.granularity.as_deref(), Some("ds"));
    assert_eq!(query.deprecation_warnings.len(), 1);

    let query = normalize(json!({"granularity": "created_at", "granularity_sqla": "ds"}));
    assert_eq!(query.granularity.as_deref(), Some("ds"));
    assert_eq!(query.deprecation_warnings.len(), 2);
}

#[test]
fn test_deprecated_extras_migrated() {
    let query = normalize(json!({"having_filters": [{"op": "=="}], "where": "a > 1"}));
    assert_eq!(query.extras["having_druid"], json!([{"op": "=="}]));
    assert_eq!(query.extras["where"], json!("a > 1"));
}

#[test]
fn test_unknown_fields_ignored() {
    let query = normalize(json!({"viz_type": "table", "metrics": ["a"]}));
    assert_eq!(query.metric_names(), vec!["a"]);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_duplicate_labels() {
    let query = normalize(json!({"metrics": ["a", "b"], "columns": ["b"]}));
    let err = query.validate(false).unwrap().unwrap();
    assert_eq!(err, ValidationError::DuplicateLabels(vec!["b".into()]));
    assert_eq!(
        err.to_string(),
        "Duplicate column/metric labels: \"b\". Please make sure all columns and metrics have a unique label."
    );
    assert_eq!(query.validate(true).unwrap_err(), err);
}

#[test]
fn test_unique_labels_pass() {
    let query = normalize(json!({"metrics": ["a"], "columns": ["b"]}));
    assert_eq!(query.validate(true).unwrap(), None);
    assert_eq!(query.validate(false).unwrap(), None);
}

#[test]
fn test_duplicates_in_first_occurrence_order() {
    let query = normalize(json!({
        "metrics": ["z", "a", {"expressionType": "SQL", "sqlExpression": "z"}],
        "columns": ["a", "a"]
    }));
    let err = query.validate(false).unwrap().unwrap();
    assert_eq!(err, ValidationError::DuplicateLabels(vec!["z".into(), "a".into()]));
}

#[test]
fn test_validate_does_not_mutate() {
    let query = normalize(json!({"metrics": ["a"], "columns": ["a"]}));
    let before = query.clone();
    let _ = query.validate(false);
    assert_eq!(query, before);
}

// ============================================================================
// Canonical mapping
// ============================================================================

#[test]
fn test_canonical_mapping_fields() {
    let query = normalize(json!({
        "metrics": [{"label": "cnt"}],
        "groupby": ["gender"],
        "orderby": [["cnt", false]],
        "time_range": "2024-01-01 : 2024-02-01",
        "filters": [{"col": "gender", "op": "==", "val": "boy"}]
    }));
    let mapping = query.to_canonical_mapping();
    let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "granularity",
            "groupby",
            "from_dttm",
            "to_dttm",
            "is_rowcount",
            "is_timeseries",
            "metrics",
            "row_limit",
            "row_offset",
            "filter",
            "timeseries_limit",
            "timeseries_limit_metric",
            "order_desc",
            "extras",
            "columns",
            "orderby",
        ]
    );
    assert_eq!(mapping["metrics"], json!(["cnt"]));
    assert_eq!(mapping["from_dttm"], json!(1_704_067_200_000_i64));
    assert_eq!(mapping["orderby"], json!([["cnt", false]]));
    assert_eq!(mapping["filter"][0]["val"], json!("boy"));
}
