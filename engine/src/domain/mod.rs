//! Domain logic for chart data queries
//!
//! - `query` - request normalization, time ranges, cache keys, validation
//! - `postprocessing` - transforms applied to result tables
//! - `chart_data` - cache-aware query execution
//! - `enrich` - batch enrichment through an external service
//! - `table` - the columnar result table

pub mod chart_data;
pub mod enrich;
pub mod error;
pub mod postprocessing;
pub mod query;
pub mod table;

pub use chart_data::{ChartDataError, ChartDataService, ChartPayload};
pub use error::ValidationError;
pub use query::{QueryDescriptor, QueryNormalizer, RawQuery};
pub use table::{Column, Table, Value};
