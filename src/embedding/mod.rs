/// Embedding generation
///
/// Pluggable embedding backends behind the `EmbeddingProvider` trait:
/// - FastEmbedProvider for local model inference (all-MiniLM-L6-v2, 384-dim)
/// - HashingProvider for deterministic, download-free embeddings
/// - EmbeddingPipeline for order-preserving batched generation
mod batch;
mod provider;

pub use batch::EmbeddingPipeline;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashingProvider};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Construct the provider named by the configuration
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "hash" => Ok(Arc::new(HashingProvider::new(config.dimension)?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider: {}. Supported: fastembed, hash",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config_hash() {
        let mut config = crate::config::Config::default().embedding;
        config.provider = "hash".to_string();
        config.dimension = 96;

        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.dimension(), 96);
        assert_eq!(provider.model_name(), "token-hash");
    }

    #[test]
    fn test_provider_from_config_unknown() {
        let mut config = crate::config::Config::default().embedding;
        config.provider = "quantum".to_string();

        assert!(provider_from_config(&config).is_err());
    }
}
