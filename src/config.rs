use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub quality: QualityConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// LLM provider settings. The service reads one provider at startup; there is
/// no runtime provider management.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Request-level timeout for one chat completion
    pub timeout_seconds: u64,
    /// Width of the semaphore gating concurrent LLM calls
    pub max_concurrency: usize,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Output dimension D; every stored vector has exactly this length
    pub dimension: usize,
    pub api_base: Option<String>,
    pub model_name: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    /// Keyword -> (dimension, increment) boosts applied by the fallback embedder
    pub semantic_boosts: HashMap<String, SemanticBoost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticBoost {
    pub dimension: usize,
    pub increment: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Cosine similarity floor for document search
    pub min_similarity: f32,
    /// Timeout for a single vector search
    pub search_timeout_seconds: u64,
    /// Timeout for a document fetch
    pub document_timeout_seconds: u64,
    /// Documents retrieved per analyzer rephrasing
    pub docs_per_rephrasing: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Sample is fully fresh within this window
    pub fresh_window_minutes: i64,
    /// Freshness decays linearly to zero at this horizon
    pub stale_after_hours: i64,
    /// Documents updated within this window get full recency credit
    pub recency_window_days: i64,
    /// Records sampled per schema when building context
    pub sample_size: usize,
    /// Hard cap on records fed to the assessor
    pub assessment_cap: usize,
    pub weight_completeness: f64,
    pub weight_freshness: f64,
    pub weight_consistency: f64,
    pub weight_accuracy: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Default device-listing limit
    pub default_limit: usize,
    /// Character budget for the assembled LLM context
    pub context_char_budget: usize,
    /// Overall per-request deadline
    pub overall_timeout_seconds: u64,
    /// Timeout for one data-source fetch
    pub data_fetch_timeout_seconds: u64,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "lumen")]
#[command(version, about = "Lumen - Network Fleet Query Service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Logging level (overrides config file, e.g., "info,fleet_rag=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// LLM API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub llm_api_base: Option<String>,

    /// LLM model name (overrides config file)
    #[arg(long, value_name = "MODEL")]
    pub llm_model: Option<String>,

    /// Enable/disable the LLM leg entirely
    #[arg(long, value_name = "BOOL")]
    pub llm_enabled: Option<bool>,

    /// Embedding dimension (overrides config file)
    #[arg(long, value_name = "DIM")]
    pub embedding_dimension: Option<usize>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with_args(&cli_args)
    }

    pub fn load_with_args(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        // Pull a .env file into the process environment before the APP_*
        // overrides are read; a missing file is fine
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!("Loaded environment from {}", path.display());
        }

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT
    /// - APP_DATABASE_URL
    /// - APP_LOG_LEVEL
    /// - APP_LLM_API_BASE / APP_LLM_MODEL / APP_LLM_API_KEY / APP_LLM_ENABLED
    /// - APP_EMBEDDING_API_BASE / APP_EMBEDDING_API_KEY / APP_EMBEDDING_DIMENSION
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
                tracing::info!("Override server.port from env: {}", self.server.port);
            }
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(base) = std::env::var("APP_LLM_API_BASE") {
            self.llm.api_base = base;
            tracing::info!("Override llm.api_base from env");
        }

        if let Ok(model) = std::env::var("APP_LLM_MODEL") {
            self.llm.model_name = model;
            tracing::info!("Override llm.model_name from env: {}", self.llm.model_name);
        }

        if let Ok(key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = Some(key);
            tracing::info!("Override llm.api_key from env");
        }

        if let Ok(enabled) = std::env::var("APP_LLM_ENABLED") {
            if let Ok(val) = enabled.parse() {
                self.llm.enabled = val;
                tracing::info!("Override llm.enabled from env: {}", self.llm.enabled);
            }
        }

        if let Ok(base) = std::env::var("APP_EMBEDDING_API_BASE") {
            self.embedding.api_base = Some(base);
            tracing::info!("Override embedding.api_base from env");
        }

        if let Ok(key) = std::env::var("APP_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
            tracing::info!("Override embedding.api_key from env");
        }

        if let Ok(dim) = std::env::var("APP_EMBEDDING_DIMENSION") {
            if let Ok(val) = dim.parse() {
                self.embedding.dimension = val;
                tracing::info!(
                    "Override embedding.dimension from env: {}",
                    self.embedding.dimension
                );
            }
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(base) = &args.llm_api_base {
            self.llm.api_base = base.clone();
            tracing::info!("Override llm.api_base from CLI");
        }

        if let Some(model) = &args.llm_model {
            self.llm.model_name = model.clone();
            tracing::info!("Override llm.model_name from CLI: {}", self.llm.model_name);
        }

        if let Some(enabled) = args.llm_enabled {
            self.llm.enabled = enabled;
            tracing::info!("Override llm.enabled from CLI: {}", self.llm.enabled);
        }

        if let Some(dim) = args.embedding_dimension {
            self.embedding.dimension = dim;
            tracing::info!("Override embedding.dimension from CLI: {}", self.embedding.dimension);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be > 0");
        }

        for (keyword, boost) in &self.embedding.semantic_boosts {
            if boost.dimension >= self.embedding.dimension {
                anyhow::bail!(
                    "semantic boost for '{}' targets dimension {} beyond D={}",
                    keyword,
                    boost.dimension,
                    self.embedding.dimension
                );
            }
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            anyhow::bail!("retrieval.min_similarity must be in [0, 1]");
        }

        let weight_sum = self.quality.weight_completeness
            + self.quality.weight_freshness
            + self.quality.weight_consistency
            + self.quality.weight_accuracy;
        if (weight_sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("quality weights must sum to 1.0, got {}", weight_sum);
        }

        if self.llm.max_concurrency == 0 {
            anyhow::bail!("llm.max_concurrency must be > 0");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/lumen.db".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,fleet_rag=debug".to_string(),
            file: Some("logs/lumen.log".to_string()),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434/v1".to_string(),
            model_name: "llama3.1:8b".to_string(),
            api_key: None,
            max_tokens: 2048,
            temperature: 0.3,
            timeout_seconds: 120,
            max_concurrency: 4,
            enabled: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            api_base: None,
            model_name: "all-MiniLM-L6-v2".to_string(),
            api_key: None,
            timeout_seconds: 10,
            semantic_boosts: default_semantic_boosts(),
        }
    }
}

/// Domain keywords that nudge the hash-derived fallback vectors so related
/// operational terms land near each other.
fn default_semantic_boosts() -> HashMap<String, SemanticBoost> {
    let table = [
        ("olt", 3, 0.4_f32),
        ("fiber", 3, 0.3),
        ("ftth", 3, 0.3),
        ("lag", 7, 0.4),
        ("aggregation", 7, 0.3),
        ("modem", 11, 0.4),
        ("mobile", 11, 0.3),
        ("team", 17, 0.4),
        ("health", 23, 0.4),
        ("monitoring", 23, 0.3),
        ("diagnostics", 23, 0.3),
        ("region", 29, 0.3),
        ("tool", 31, 0.3),
    ];

    table
        .into_iter()
        .map(|(kw, dimension, increment)| (kw.to_string(), SemanticBoost { dimension, increment }))
        .collect()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            search_timeout_seconds: 5,
            document_timeout_seconds: 5,
            docs_per_rephrasing: 3,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            fresh_window_minutes: 15,
            stale_after_hours: 24,
            recency_window_days: 90,
            sample_size: 25,
            assessment_cap: 200,
            weight_completeness: 0.30,
            weight_freshness: 0.25,
            weight_consistency: 0.25,
            weight_accuracy: 0.20,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            context_char_budget: 16_384,
            overall_timeout_seconds: 150,
            data_fetch_timeout_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn quality_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.quality.weight_accuracy = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn boost_dimension_must_fit() {
        let mut config = Config::default();
        config.embedding.dimension = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_section_roundtrip() {
        let raw = r#"
            [server]
            port = 9090

            [llm]
            model_name = "gpt-4o-mini"
            max_concurrency = 2

            [quality]
            fresh_window_minutes = 5
        "#;
        let config: Config = toml::from_str(raw).expect("parse config");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.llm.model_name, "gpt-4o-mini");
        assert_eq!(config.llm.max_concurrency, 2);
        assert_eq!(config.quality.fresh_window_minutes, 5);
        // Untouched sections keep defaults
        assert_eq!(config.embedding.dimension, 384);
    }
}
