use crate::config::Config;
use crate::error::{PassimError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_splitter(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PassimError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory path cannot be empty",
            ));
        }
    }

    fn validate_splitter(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.splitter.max_chars == 0 {
            errors.push(ValidationError::new(
                "splitter.max_chars",
                "Maximum passage length must be greater than 0",
            ));
        }

        if config.splitter.overlap_chars >= config.splitter.max_chars {
            errors.push(ValidationError::new(
                "splitter.overlap_chars",
                format!(
                    "Overlap ({}) must be smaller than max_chars ({})",
                    config.splitter.overlap_chars, config.splitter.max_chars
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if provider != "fastembed" && provider != "hash" {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!("Provider must be 'fastembed' or 'hash', got '{}'", provider),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.max_concurrent_batches == 0 {
            errors.push(ValidationError::new(
                "embedding.max_concurrent_batches",
                "Concurrent batch limit must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let metric = &config.index.metric;
        if metric != "cosine" && metric != "dot" {
            errors.push(ValidationError::new(
                "index.metric",
                format!("Metric must be 'cosine' or 'dot', got '{}'", metric),
            ));
        }

        if config.index.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.ef_search == 0 {
            errors.push(ValidationError::new(
                "index.ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        let fraction = config.index.compact_dead_fraction;
        if !(0.0..1.0).contains(&fraction) {
            errors.push(ValidationError::new(
                "index.compact_dead_fraction",
                format!("Dead fraction must be in [0.0, 1.0), got {}", fraction),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.default_limit == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_limit",
                "Default result limit must be greater than 0",
            ));
        }

        if config.retrieval.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.search_multiplier",
                "Search multiplier must be at least 1",
            ));
        }

        if config.retrieval.max_search_multiplier < config.retrieval.search_multiplier {
            errors.push(ValidationError::new(
                "retrieval.max_search_multiplier",
                format!(
                    "Backfill cap ({}) cannot be below search_multiplier ({})",
                    config.retrieval.max_search_multiplier, config.retrieval.search_multiplier
                ),
            ));
        }

        let min_score = config.retrieval.min_score;
        if !min_score.is_finite() || min_score < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.min_score",
                format!("Minimum score must be finite and >= 0.0, got {}", min_score),
            ));
        }
    }
}
