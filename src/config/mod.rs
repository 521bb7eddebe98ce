//! Configuration management for passim
//!
//! Handles loading, validation, and defaults for every tunable the engine
//! exposes: passage splitting, embedding, index construction, and retrieval.

use crate::error::{PassimError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub splitter: SplitterConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the corpus database, raw-text archive, and index files
    pub data_dir: PathBuf,
}

/// Passage splitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Maximum passage length in characters
    pub max_chars: usize,
    /// Characters each passage shares with its predecessor
    pub overlap_chars: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider backend: "fastembed" (local model) or "hash" (deterministic)
    pub provider: String,
    /// Model name for the fastembed provider (e.g. "all-MiniLM-L6-v2")
    pub model: String,
    /// Vector dimension; must match what the provider produces
    pub dimension: usize,
    /// Passages embedded per provider call
    pub batch_size: usize,
    /// Concurrent embedding batches per ingestion
    pub max_concurrent_batches: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Similarity metric: "cosine" or "dot"; fixed for the index's lifetime
    pub metric: String,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW construction breadth (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW search breadth (higher = better recall, slower query)
    pub ef_search: usize,
    /// Bypass the graph and scan all vectors; deterministic, for testing
    pub exact_search: bool,
    /// Rebuild the graph once this fraction of entries is dead
    pub compact_dead_fraction: f32,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results when the caller does not specify k
    pub default_limit: usize,
    /// Candidates fetched per query as a multiple of k
    pub search_multiplier: usize,
    /// Cap on the fetch breadth when backfilling filtered queries
    pub max_search_multiplier: usize,
    /// Drop hits scoring below this threshold (0.0 disables)
    pub min_score: f32,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PassimError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PassimError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PASSIM_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("PASSIM_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "EMBEDDING__PROVIDER" => {
                self.embedding.provider = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "INDEX__EXACT_SEARCH" => {
                self.index.exact_search =
                    value.parse().map_err(|_| PassimError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "INDEX__EF_SEARCH" => {
                self.index.ef_search =
                    value.parse().map_err(|_| PassimError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PassimError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("passim").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| PassimError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".passim"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.passim"),
            },
            splitter: SplitterConfig {
                max_chars: 1000,
                overlap_chars: 100,
            },
            embedding: EmbeddingConfig {
                provider: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                batch_size: 32,
                max_concurrent_batches: 2,
            },
            index: IndexConfig {
                metric: "cosine".to_string(),
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                ef_search: 50,
                exact_search: false,
                compact_dead_fraction: 0.3,
            },
            retrieval: RetrievalConfig {
                default_limit: 3,
                search_multiplier: 4,
                max_search_multiplier: 16,
                min_score: 0.0,
            },
        }
    }
}
