//! Configuration module for the similarity index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `IX_` and use double underscores
//! to separate nested levels:
//! - `IX_EMBEDDING__BATCH_SIZE=64` sets `embedding.batch_size`
//! - `IX_CORPUS__TEXT_COLUMN=body` sets `corpus.text_column`
//! - `IX_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{IndexError, IndexResult};

/// Directory holding settings and, by default, the index.
pub const CONFIG_DIR: &str = ".insight";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory the persisted index is written to and read from
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode (raises the default log level)
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Corpus column mapping
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Embedding provider and batching
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query defaults
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CorpusConfig {
    #[serde(default = "default_id_column")]
    pub id_column: String,

    #[serde(default = "default_title_column")]
    pub title_column: String,

    /// Column whose text is embedded
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// Optional short-summary column; an empty name disables it
    #[serde(default = "default_summary_column")]
    pub summary_column: Option<String>,

    /// "auto", "csv", "jsonl" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts after the first failure of a batch
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial backoff, doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-call timeout; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Batches in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Where downloaded models are cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QueryConfig {
    /// Results returned when the caller does not pass `k`
    #[serde(default = "default_k")]
    pub default_k: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_false() -> bool {
    false
}
fn default_id_column() -> String {
    "id".to_string()
}
fn default_title_column() -> String {
    "title".to_string()
}
fn default_text_column() -> String {
    "abstract".to_string()
}
fn default_summary_column() -> Option<String> {
    Some("tldr".to_string())
}
fn default_format() -> String {
    "auto".to_string()
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}
fn default_k() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            corpus: CorpusConfig::default(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            title_column: default_title_column(),
            text_column: default_text_column(),
            summary_column: default_summary_column(),
            format: default_format(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            cache_dir: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

impl EmbeddingConfig {
    /// `None` when timeouts are disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for the config directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed("IX_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Reject settings that would fail later in a less obvious way.
    pub fn validate(&self) -> IndexResult<()> {
        if self.corpus.text_column.trim().is_empty() {
            return Err(IndexError::config("corpus.text_column must not be empty"));
        }
        if !matches!(self.corpus.format.as_str(), "auto" | "csv" | "jsonl" | "json") {
            return Err(IndexError::config(format!(
                "corpus.format must be one of auto, csv, jsonl, json (got '{}')",
                self.corpus.format
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(IndexError::config("embedding.batch_size must be at least 1"));
        }
        if self.embedding.concurrency == 0 {
            return Err(IndexError::config("embedding.concurrency must be at least 1"));
        }
        if self.query.default_k == 0 {
            return Err(IndexError::config("query.default_k must be at least 1"));
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let header = "# insight-index settings\n\
             # Environment overrides use the IX_ prefix, e.g. IX_EMBEDDING__BATCH_SIZE=64\n\n";
        let body = toml::to_string_pretty(&Settings::default())?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, format!("{header}{body}"))?;

        Ok(config_path)
    }
}
