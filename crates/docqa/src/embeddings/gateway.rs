//! Batched, bounded-concurrency access to an embedding provider

use futures::{stream, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retry::{with_timeout, RetryPolicy};
use crate::types::Chunk;

use super::cache::EmbeddingCache;

/// Front door to the embedding model
///
/// Texts are split into batches of `batch_size`; at most `concurrency`
/// batches are in flight and results come back in input order. Every
/// request is bounded by `timeout` and retried per `retry`. Vectors are
/// cached by content hash, so a build retried after a failure only pays
/// for the batches that did not complete.
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    timeout: Duration,
    retry: RetryPolicy,
    cache: Mutex<EmbeddingCache>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: 16,
            concurrency: 4,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            cache: Mutex::new(EmbeddingCache::new(10_000)),
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self::new(provider)
            .with_batching(config.embeddings.batch_size, config.embeddings.concurrency)
            .with_timeout(config.llm.timeout())
            .with_retry(config.llm.retry_policy())
            .with_cache_capacity(config.embeddings.cache_capacity)
    }

    pub fn with_batching(mut self, batch_size: usize, concurrency: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(EmbeddingCache::new(capacity));
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Embed `texts`, one vector per text in input order
    ///
    /// All or nothing: any batch that still fails after retries fails the
    /// whole call.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = {
            let cache = self.cache.lock();
            texts.iter().map(|t| cache.get(t)).collect()
        };
        let misses: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
        if misses.is_empty() {
            return Ok(vectors.into_iter().flatten().collect());
        }

        tracing::debug!(
            "Embedding {} texts ({} cached) in batches of {}",
            texts.len(),
            texts.len() - misses.len(),
            self.batch_size
        );

        let batches: Vec<Vec<String>> = misses
            .chunks(self.batch_size)
            .map(|ids| ids.iter().map(|&i| texts[i].clone()).collect())
            .collect();

        // Futures own their batch so the whole call stays Send
        let results: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| async move { self.embed_batch(&batch).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        for (slot, vector) in misses.into_iter().zip(results.into_iter().flatten()) {
            vectors[slot] = Some(vector);
        }

        vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::internal("embedding missing after batch completed")))
            .collect()
    }

    /// Embed a single question
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::internal("no embedding returned for query"))
    }

    /// Attach a vector to every chunk, or fail without returning any
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(&texts).await?;
        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_vector(vector))
            .collect()
    }

    /// One provider call with timeout and retry, validated and cached
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = &self.provider;
        let timeout = self.timeout;

        let vectors = self
            .retry
            .run("embedding batch", move || {
                with_timeout(timeout, provider.embed_batch(batch), move || {
                    Error::embedding(format!("embedding request timed out after {:?}", timeout))
                })
            })
            .await?;

        if vectors.len() != batch.len() {
            return Err(Error::embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        let expected = self.dimensions();
        for vector in &vectors {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::embedding("provider returned a non-finite vector"));
            }
        }

        let mut cache = self.cache.lock();
        for (text, vector) in batch.iter().zip(&vectors) {
            cache.insert(text, vector.clone());
        }

        Ok(vectors)
    }
}
