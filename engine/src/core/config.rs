use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::source::Datasource;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TIMEOUT_SECS,
    DEFAULT_RELATIVE_END, DEFAULT_RELATIVE_START, DEFAULT_ROW_LIMIT,
};

// =============================================================================
// Eviction Policy Enum
// =============================================================================

/// Cache eviction policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// TinyLFU - LRU eviction + LFU admission (near-optimal hit ratio)
    #[default]
    TinyLfu,
    /// Simple LRU (better for recency-biased workloads)
    Lru,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::TinyLfu => write!(f, "tinylfu"),
            EvictionPolicy::Lru => write!(f, "lru"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Query normalization section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    pub row_limit: Option<u64>,
    pub relative_start: Option<String>,
    pub relative_end: Option<String>,
    /// Attach default time range endpoints to queries that carry none
    pub sip15_enabled: Option<bool>,
}

/// Cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    /// Maximum number of cache entries
    pub max_entries: Option<u64>,
    /// Cache eviction policy
    pub eviction_policy: Option<EvictionPolicy>,
    /// Default TTL for cached payloads
    pub timeout_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub query: Option<QueryFileConfig>,
    pub cache: Option<CacheFileConfig>,
    /// Datasources queries may reference, replaced wholesale by later files
    pub datasources: Option<Vec<Datasource>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            if query.row_limit.is_some() {
                tracing::trace!(row_limit = ?query.row_limit, "Merging query.row_limit");
                current.row_limit = query.row_limit;
            }
            if query.relative_start.is_some() {
                tracing::trace!(relative_start = ?query.relative_start, "Merging query.relative_start");
                current.relative_start = query.relative_start;
            }
            if query.relative_end.is_some() {
                tracing::trace!(relative_end = ?query.relative_end, "Merging query.relative_end");
                current.relative_end = query.relative_end;
            }
            if query.sip15_enabled.is_some() {
                tracing::trace!(sip15_enabled = ?query.sip15_enabled, "Merging query.sip15_enabled");
                current.sip15_enabled = query.sip15_enabled;
            }
        }

        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.max_entries.is_some() {
                tracing::trace!(max_entries = ?cache.max_entries, "Merging cache.max_entries");
                current.max_entries = cache.max_entries;
            }
            if cache.eviction_policy.is_some() {
                tracing::trace!(eviction_policy = ?cache.eviction_policy, "Merging cache.eviction_policy");
                current.eviction_policy = cache.eviction_policy;
            }
            if cache.timeout_secs.is_some() {
                tracing::trace!(timeout_secs = ?cache.timeout_secs, "Merging cache.timeout_secs");
                current.timeout_secs = cache.timeout_secs;
            }
        }

        if other.datasources.is_some() {
            tracing::trace!(datasources = ?other.datasources, "Merging datasources");
            self.datasources = other.datasources;
        }
    }
}

// =============================================================================
// Resolved Config Structs
// =============================================================================

/// Defaults applied while normalizing queries
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub row_limit_default: u64,
    pub relative_start_default: String,
    pub relative_end_default: String,
    pub sip15_enabled: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            row_limit_default: DEFAULT_ROW_LIMIT,
            relative_start_default: DEFAULT_RELATIVE_START.to_string(),
            relative_end_default: DEFAULT_RELATIVE_END.to_string(),
            sip15_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub eviction_policy: EvictionPolicy,
    /// TTL used when a write does not name one
    pub default_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            eviction_policy: EvictionPolicy::default(),
            default_timeout: Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECS),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub datasources: Vec<Datasource>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.chartquery/chartquery.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Ok(Self::resolve(cli, file_config))
    }

    /// Layer CLI/env overrides over file values over defaults
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_query = file_config.query.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();

        let query = QueryConfig {
            row_limit_default: cli
                .row_limit
                .or(file_query.row_limit)
                .unwrap_or(DEFAULT_ROW_LIMIT),
            relative_start_default: file_query
                .relative_start
                .unwrap_or_else(|| DEFAULT_RELATIVE_START.to_string()),
            relative_end_default: file_query
                .relative_end
                .unwrap_or_else(|| DEFAULT_RELATIVE_END.to_string()),
            sip15_enabled: cli.sip15.or(file_query.sip15_enabled).unwrap_or(false),
        };

        let cache = CacheConfig {
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            eviction_policy: cli
                .cache_eviction_policy
                .or(file_cache.eviction_policy)
                .unwrap_or_default(),
            default_timeout: Duration::from_secs(
                cli.cache_timeout_secs
                    .or(file_cache.timeout_secs)
                    .unwrap_or(DEFAULT_CACHE_TIMEOUT_SECS),
            ),
        };

        Self {
            query,
            cache,
            datasources: file_config.datasources.unwrap_or_default(),
        }
    }
}

/// Get the profile config path (~/.chartquery/chartquery.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
