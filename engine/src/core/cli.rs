use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::EvictionPolicy;
use super::constants::{
    APP_NAME_LOWER, ENV_CACHE_EVICTION_POLICY, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TIMEOUT_SECS,
    ENV_CONFIG, ENV_ROW_LIMIT, ENV_SIP15,
};

#[derive(Parser)]
#[command(name = APP_NAME_LOWER)]
#[command(version, about = "Chart data query engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Row limit applied to queries that do not set one
    #[arg(long, global = true, env = ENV_ROW_LIMIT)]
    pub row_limit: Option<u64>,

    /// Attach default time range endpoints to queries that carry none
    #[arg(long, global = true, env = ENV_SIP15)]
    pub sip15: Option<bool>,

    // Cache options
    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Cache eviction policy (tinylfu or lru)
    #[arg(long, global = true, env = ENV_CACHE_EVICTION_POLICY, value_parser = parse_eviction_policy)]
    pub cache_eviction_policy: Option<EvictionPolicy>,

    /// Default TTL for cached payloads, in seconds
    #[arg(long, global = true, env = ENV_CACHE_TIMEOUT_SECS)]
    pub cache_timeout_secs: Option<u64>,
}

/// Parse eviction policy from CLI/env string
fn parse_eviction_policy(s: &str) -> Result<EvictionPolicy, String> {
    match s.to_lowercase().as_str() {
        "tinylfu" => Ok(EvictionPolicy::TinyLfu),
        "lru" => Ok(EvictionPolicy::Lru),
        _ => Err(format!(
            "Invalid eviction policy '{}'. Valid options: tinylfu, lru",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Normalize a query object and print its canonical form
    Normalize {
        /// JSON file holding one query object
        query: PathBuf,
    },
    /// Print the cache key a query object resolves to
    CacheKey {
        /// JSON file holding one query object
        query: PathBuf,
    },
    /// Execute a query against a JSON records file and print the payload
    Run {
        /// JSON file holding one query object
        query: PathBuf,

        /// JSON file holding an array of records
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Bypass cached payloads
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub row_limit: Option<u64>,
    pub sip15: Option<bool>,
    pub cache_max_entries: Option<u64>,
    pub cache_eviction_policy: Option<EvictionPolicy>,
    pub cache_timeout_secs: Option<u64>,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            row_limit: cli.row_limit,
            sip15: cli.sip15,
            cache_max_entries: cli.cache_max_entries,
            cache_eviction_policy: cli.cache_eviction_policy,
            cache_timeout_secs: cli.cache_timeout_secs,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig::from(&cli);
    (config, cli.command)
}
