//! Core application

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, DEFAULT_LOG_FILTER, ENV_LOG};
use crate::data::cache::CacheService;
use crate::data::source::{JsonFileSource, StaticResolver};
use crate::domain::chart_data::ChartDataService;
use crate::domain::query::{QueryDescriptor, QueryNormalizer};

pub struct CoreApp {
    pub config: AppConfig,
    pub resolver: StaticResolver,
    pub cache: Arc<CacheService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!(app = APP_NAME, version = env!("CARGO_PKG_VERSION"), "Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;
        app.dispatch(command).await
    }

    pub fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let cache = Arc::new(
            CacheService::new(&config.cache)
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let resolver = config.datasources.iter().cloned().collect();
        Ok(Self {
            config,
            resolver,
            cache,
        })
    }

    async fn dispatch(&self, command: Commands) -> Result<()> {
        let output = match command {
            Commands::Normalize { query } => {
                let query = self.load_query(&query)?;
                JsonValue::Object(query.to_canonical_mapping())
            }
            Commands::CacheKey { query } => {
                let query = self.load_query(&query)?;
                JsonValue::String(query.cache_key(&serde_json::Map::new()))
            }
            Commands::Run { query, data, force } => {
                let query = self.load_query(&query)?;
                let service = ChartDataService::new(
                    Arc::new(JsonFileSource::new(data)),
                    Some(self.cache.clone()),
                );
                let payload = service.get_payload(&query, force).await?;
                serde_json::to_value(payload)?
            }
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Read and normalize one query object from a JSON file
    pub fn load_query(&self, path: &Path) -> Result<QueryDescriptor> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {}", path.display()))?;
        let raw: JsonValue = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse query file: {}", path.display()))?;
        Ok(QueryNormalizer::new(&self.config.query, &self.resolver).normalize_value(&raw)?)
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn json_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn app_with_config(content: &str) -> (NamedTempFile, CoreApp) {
        let config = json_file(content);
        let cli = CliConfig {
            config: Some(config.path().to_path_buf()),
            ..CliConfig::default()
        };
        let app = CoreApp::init(&cli).unwrap();
        (config, app)
    }

    #[test]
    fn test_default_log_filter_targets_library() {
        let crate_name = module_path!().split("::").next().unwrap();
        let directive = format!("{}=info", crate_name);
        assert!(DEFAULT_LOG_FILTER.split(',').any(|d| d == directive));
    }

    #[test]
    fn test_load_query_resolves_configured_datasource() {
        let (_config, app) = app_with_config(
            r#"{ "datasources": [{ "type": "table", "id": 3, "name": "birth_names" }],
                 "query": { "row_limit": 25 } }"#,
        );
        let query = json_file(r#"{ "datasource": { "id": 3, "type": "table" } }"#);
        let descriptor = app.load_query(query.path()).unwrap();
        assert_eq!(descriptor.datasource.unwrap().name, "birth_names");
        assert_eq!(descriptor.row_limit, 25);
    }

    #[test]
    fn test_load_query_unknown_datasource() {
        let (_config, app) = app_with_config("{}");
        let query = json_file(r#"{ "datasource": { "id": 9, "type": "table" } }"#);
        let err = app.load_query(query.path()).unwrap_err();
        assert!(err.to_string().contains("9"));
    }

    #[test]
    fn test_load_query_bad_json() {
        let (_config, app) = app_with_config("{}");
        let query = json_file("[1, 2");
        let err = app.load_query(query.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse query file"));
    }

    #[tokio::test]
    async fn test_run_command_prints_payload() {
        let (_config, app) = app_with_config("{}");
        let query = json_file(r#"{ "columns": ["name"] }"#);
        let data = json_file(r#"[{ "name": "a" }, { "name": "b" }]"#);
        app.dispatch(Commands::Run {
            query: query.path().to_path_buf(),
            data: data.path().to_path_buf(),
            force: false,
        })
        .await
        .unwrap();
    }
}
