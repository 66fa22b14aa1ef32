//! JSON utility functions
//!
//! The canonical encoder here is shared by cache-key derivation and every
//! other place that needs byte-stable JSON text.

use serde_json::{Map, Value as JsonValue};

/// Serialize a JSON value to canonical text.
///
/// Object keys are sorted recursively so two logically equal values always
/// encode to identical bytes, regardless of the insertion order of their maps.
pub fn canonical_json(value: &JsonValue) -> String {
    let sorted = sort_keys(value);
    // Serializing a serde_json::Value cannot fail: keys are strings and
    // numbers are always finite.
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// md5 hex digest of the canonical encoding
pub fn canonical_digest(value: &JsonValue) -> String {
    format!("{:x}", md5::compute(canonical_json(value).as_bytes()))
}

fn sort_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key.as_str()]));
            }
            JsonValue::Object(sorted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// JSON float, mapping NaN and infinities to `null` instead of failing
pub fn json_f64(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Python-style truthiness of a JSON value, used for legacy request fields
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}
