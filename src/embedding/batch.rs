/// Batched embedding with bounded concurrency
use super::{EmbeddingError, EmbeddingProvider};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Runs embedding batches on the blocking pool without flooding it.
///
/// Input order is preserved: the output vector at position `i` belongs to
/// the input text at position `i`, no matter how batches interleave. Any
/// batch failure fails the whole call, so callers never see partial output.
pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent: usize,
}

impl EmbeddingPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed all texts, in input order
    pub async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total = texts.len();
        let batches: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let batch_count = batches.len();
        debug!("Embedding {} texts in {} batches", total, batch_count);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(batch_count);

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;
            let provider = self.provider.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                let result = provider.embed_batch(&batch);
                drop(permit);
                (batch_index, result)
            }));
        }

        let mut slots: Vec<Option<Vec<Vec<f32>>>> = (0..batch_count).map(|_| None).collect();
        for handle in handles {
            let (batch_index, result) = handle.await.map_err(|e| {
                EmbeddingError::GenerationError(format!("embedding task panicked: {}", e))
            })?;
            slots[batch_index] = Some(result?);
        }

        let mut embeddings = Vec::with_capacity(total);
        for slot in slots {
            match slot {
                Some(batch) => embeddings.extend(batch),
                None => {
                    return Err(EmbeddingError::GenerationError(
                        "embedding batch produced no result".to_string(),
                    ));
                }
            }
        }

        if embeddings.len() != total {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                total,
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
