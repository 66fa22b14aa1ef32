// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "ChartQuery";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "chartquery";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".chartquery";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "chartquery.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CHARTQUERY_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CHARTQUERY_LOG";

/// Filter used when neither CHARTQUERY_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,chartquery_engine=info";

// =============================================================================
// Query Normalization
// =============================================================================

/// Environment variable for the default row limit
pub const ENV_ROW_LIMIT: &str = "CHARTQUERY_ROW_LIMIT";

/// Environment variable enabling SIP-15 time range endpoints
pub const ENV_SIP15: &str = "CHARTQUERY_SIP15";

/// Row limit applied when a query leaves `row_limit` unset
pub const DEFAULT_ROW_LIMIT: u64 = 50_000;

/// Default anchor for the start of relative time ranges
pub const DEFAULT_RELATIVE_START: &str = "today";

/// Default anchor for the end of relative time ranges
pub const DEFAULT_RELATIVE_END: &str = "today";

/// Reserved column alias for the temporal axis of timeseries queries
pub const DTTM_ALIAS: &str = "__timestamp";

/// Time range endpoints attached when SIP-15 is enabled and the client sent none
pub const DEFAULT_TIME_RANGE_ENDPOINTS: [&str; 2] = ["inclusive", "exclusive"];

/// Time range value meaning "no time bounds"
pub const NO_TIME_RANGE: &str = "No filter";

/// Separator between the since and until parts of a time range
pub const TIME_RANGE_SEPARATOR: &str = " : ";

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "CHARTQUERY_CACHE_MAX_ENTRIES";

/// Environment variable for cache eviction policy
pub const ENV_CACHE_EVICTION_POLICY: &str = "CHARTQUERY_CACHE_EVICTION_POLICY";

/// Environment variable for the default cache timeout
pub const ENV_CACHE_TIMEOUT_SECS: &str = "CHARTQUERY_CACHE_TIMEOUT_SECS";

/// Default maximum cache entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Default TTL for cached chart payloads (seconds)
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 86_400;

/// Default TTL for memoized function results (seconds)
pub const DEFAULT_MEMOIZE_TTL_SECS: u64 = 600;

/// Version prefix for all cache keys (bump to invalidate everything)
pub const CACHE_KEY_VERSION: &str = "v1";

// =============================================================================
// External Enrichment
// =============================================================================

/// Relevance above which an enrichment result counts as a success
pub const ENRICH_SUCCESS_RELEVANCE: f64 = 0.8;

/// Relevance above which an enrichment result counts as doubtful
pub const ENRICH_DOUBT_RELEVANCE: f64 = 0.49;

/// Consecutive failures after which a batch is aborted
pub const ENRICH_MAX_CONSECUTIVE_FAILURES: usize = 2;
