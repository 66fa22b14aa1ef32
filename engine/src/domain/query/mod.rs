//! Query normalization
//!
//! Turns a loosely-typed client request (`RawQuery`) into a canonical
//! `QueryDescriptor`: relative time ranges resolved, metrics normalized,
//! deprecated fields migrated and post-processing steps parsed. The
//! descriptor then provides the canonical mapping, cache key and label
//! validation.

mod cache_key;
pub mod date_parser;
mod deprecated;
mod descriptor;
mod metric;
mod raw;

pub use cache_key::ANNOTATION_CACHE_FIELDS;
pub use date_parser::{HumanDelta, TimeUnit, get_since_until, parse_human_datetime, parse_human_delta};
pub use deprecated::{DEPRECATED_EXTRAS_FIELDS, DEPRECATED_FIELDS, DeprecatedField, DeprecationWarning};
pub use descriptor::{QueryDescriptor, QueryNormalizer};
pub use metric::Metric;
pub use raw::{DatasourceRef, RawQuery, ResultType};
