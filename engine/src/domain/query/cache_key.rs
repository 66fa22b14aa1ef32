//! Deterministic cache keys for normalized queries
//!
//! The resolved `from_dttm`/`to_dttm` are replaced by the raw `time_range`
//! expression, so a relative range such as "Last week" maps to the same key
//! for as long as the entry lives. Queries without a `time_range` but with
//! explicit bounds keep those bounds (epoch milliseconds) instead, so two
//! different absolute windows never collide.

use serde_json::{Map, Value as JsonValue, json};

use super::descriptor::QueryDescriptor;
use crate::utils::json::canonical_digest;
use crate::utils::time::datetime_to_millis;

/// Annotation layer fields that affect the payload
pub const ANNOTATION_CACHE_FIELDS: &[&str] = &[
    "annotationType",
    "descriptionColumns",
    "intervalEndColumn",
    "name",
    "overrides",
    "sourceType",
    "timeColumn",
    "titleColumn",
    "value",
];

impl QueryDescriptor {
    /// The mapping that `cache_key` digests
    pub fn cache_key_payload(&self, extra: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut payload = self.to_canonical_mapping();
        payload.remove("from_dttm");
        payload.remove("to_dttm");

        if let Some(time_range) = &self.time_range {
            payload.insert("time_range".into(), json!(time_range));
        } else if self.from_dttm.is_some() || self.to_dttm.is_some() {
            let from = self.from_dttm.as_ref().map(datetime_to_millis);
            let to = self.to_dttm.as_ref().map(datetime_to_millis);
            payload.insert("from_dttm".into(), json!(from));
            payload.insert("to_dttm".into(), json!(to));
        }
        if let Some(time_shift) = &self.time_shift_expr {
            payload.insert("time_shift".into(), json!(time_shift));
        }

        if !self.post_processing.is_empty() {
            let steps = self
                .post_processing
                .iter()
                .map(|step| step.raw().clone())
                .collect();
            payload.insert("post_processing".into(), JsonValue::Array(steps));
        }

        let annotation_layers: Vec<JsonValue> = self
            .annotation_layers
            .iter()
            .map(|layer| {
                let projected: Map<String, JsonValue> = ANNOTATION_CACHE_FIELDS
                    .iter()
                    .filter_map(|field| layer.get(*field).map(|v| (field.to_string(), v.clone())))
                    .collect();
                JsonValue::Object(projected)
            })
            .collect();
        if !annotation_layers.is_empty() {
            payload.insert("annotation_layers".into(), JsonValue::Array(annotation_layers));
        }

        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }

        if let Some(datasource) = &self.datasource {
            payload.insert("datasource".into(), json!(datasource.uid()));
        }
        if let Some(result_type) = self.result_type {
            payload.insert("result_type".into(), json!(result_type.as_str()));
        }
        payload
    }

    /// md5 hex digest of the canonical encoding of `cache_key_payload`
    pub fn cache_key(&self, extra: &Map<String, JsonValue>) -> String {
        canonical_digest(&JsonValue::Object(self.cache_key_payload(extra)))
    }
}
