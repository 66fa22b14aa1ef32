//! Cache key derivation
//!
//! `CacheKey` builds versioned keys for entries this crate owns;
//! `generate_cache_key` and `view_cache_key` are content-addressed helpers
//! over the canonical JSON encoding.

use serde_json::{Map, Value as JsonValue};

use crate::core::constants::CACHE_KEY_VERSION;
use crate::utils::json::canonical_digest;

/// Type-safe cache key builder
///
/// All keys are prefixed with a version (e.g., "v1:") to allow
/// invalidating all cached data on schema changes.
pub struct CacheKey;

impl CacheKey {
    /// Cache key for a chart data payload, addressed by its query digest
    pub fn chart_data(digest: &str) -> String {
        format!("{}:chart:{}", CACHE_KEY_VERSION, digest)
    }

    /// Cache key for a memoized function result
    pub fn memoized(namespace: &str, digest: &str) -> String {
        format!("{}:memo:{}:{}", CACHE_KEY_VERSION, namespace, digest)
    }
}

/// `prefix` followed by the md5 of the canonical encoding of `values`
///
/// Two mappings with the same content produce the same key whatever their
/// key order.
pub fn generate_cache_key(values: &JsonValue, prefix: &str) -> String {
    format!("{}{}", prefix, canonical_digest(values))
}

/// Key for a rendered view: request path plus a digest of the (unordered)
/// request arguments
pub fn view_cache_key(path: &str, args: &Map<String, JsonValue>) -> String {
    let args = JsonValue::Object(args.clone());
    format!("view/{}/{}", path.trim_matches('/'), canonical_digest(&args))
}
