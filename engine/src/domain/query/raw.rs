//! Loosely-typed query request as submitted by clients

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::domain::error::ValidationError;

/// Requested result shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Full,
    Query,
    Results,
    Samples,
    Timegrains,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Query => "query",
            Self::Results => "results",
            Self::Samples => "samples",
            Self::Timegrains => "timegrains",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{"type": "table", "id": 3}`; the id may also arrive as a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Str(String),
    }
    match Id::deserialize(deserializer)? {
        Id::Int(id) => Ok(id),
        Id::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid datasource id: {}", s))),
    }
}

/// Raw request fields. Every field is optional; defaults are applied by
/// `QueryNormalizer`. Fields not listed here land in `legacy`, where
/// deprecated names are migrated and anything else is logged and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawQuery {
    pub datasource: Option<DatasourceRef>,
    pub result_type: Option<ResultType>,
    pub annotation_layers: Option<Vec<Map<String, JsonValue>>>,
    pub applied_time_extras: Option<Map<String, JsonValue>>,
    pub granularity: Option<String>,
    pub metrics: Option<Vec<JsonValue>>,
    pub groupby: Option<Vec<String>>,
    pub filters: Option<Vec<JsonValue>>,
    pub time_range: Option<String>,
    pub time_shift: Option<String>,
    pub is_timeseries: Option<bool>,
    pub timeseries_limit: Option<u64>,
    pub timeseries_limit_metric: Option<JsonValue>,
    pub row_limit: Option<u64>,
    pub row_offset: Option<u64>,
    pub order_desc: Option<bool>,
    pub extras: Option<Map<String, JsonValue>>,
    pub columns: Option<Vec<String>>,
    pub orderby: Option<Vec<(JsonValue, bool)>>,
    pub post_processing: Option<Vec<JsonValue>>,
    pub is_rowcount: Option<bool>,
    #[serde(flatten)]
    pub legacy: Map<String, JsonValue>,
}

impl RawQuery {
    pub fn from_value(value: &JsonValue) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::MalformedQuery(
                "query must be a JSON object".into(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::MalformedQuery(e.to_string()))
    }
}
