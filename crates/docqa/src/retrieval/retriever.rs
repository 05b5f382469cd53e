//! Question-to-chunks retrieval for one document session

use std::sync::Arc;

use crate::embeddings::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::types::{DocumentSession, RetrievedChunk};

/// Embeds questions and searches a session's index
pub struct Retriever {
    gateway: Arc<EmbeddingGateway>,
    /// Results scoring below this are dropped
    min_similarity: Option<f32>,
}

impl Retriever {
    pub fn new(gateway: Arc<EmbeddingGateway>) -> Self {
        Self {
            gateway,
            min_similarity: None,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: Option<f32>) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    /// Up to `k` chunks of `session` most similar to `question`, best first
    pub async fn retrieve(
        &self,
        session: &DocumentSession,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(Error::config("k must be greater than 0"));
        }
        if !session.index_ready() {
            return Err(Error::IndexNotReady(session.document_id().to_string()));
        }
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }
        if session.chunk_count() == 0 {
            return Ok(Vec::new());
        }
        if self.gateway.model_id() != session.embedding_model_id() {
            return Err(Error::ModelMismatch {
                expected: self.gateway.model_id().to_string(),
                found: session.embedding_model_id().to_string(),
            });
        }

        let query_vector = self.gateway.embed_query(question).await?;
        let hits = session.index().search(&query_vector, k)?;

        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| self.min_similarity.map_or(true, |min| hit.score >= min))
            .filter_map(|hit| {
                session.chunk(hit.chunk_id).map(|chunk| RetrievedChunk {
                    chunk: chunk.without_vector(),
                    score: hit.score,
                    rank: hit.rank,
                })
            })
            .collect();

        tracing::debug!(
            "Retrieved {} chunks for document {}",
            retrieved.len(),
            crate::index::short_id(session.document_id())
        );

        Ok(retrieved)
    }
}
