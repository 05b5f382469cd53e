//! Query and answer types returned to callers

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

/// One ranked hit from the vector index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matched chunk id
    pub chunk_id: u32,
    /// Cosine similarity (-1.0..=1.0, higher is better)
    pub score: f32,
    /// 1-based position in the ranking
    pub rank: usize,
}

/// A chunk dereferenced from a [`QueryResult`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub rank: usize,
}

/// Synthesized answer with the chunks it was conditioned on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text
    pub text: String,
    /// Ids of the chunks packed into the prompt, in rank order
    pub cited_chunk_ids: Vec<u32>,
}

impl Answer {
    /// Whether the answer was grounded on at least one chunk
    pub fn is_grounded(&self) -> bool {
        !self.cited_chunk_ids.is_empty()
    }
}

/// Source snippet backing an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Chunk ID
    pub chunk_id: u32,
    /// Starting character index in the document text
    pub source_offset: usize,
    /// 1-based page the snippet starts on; `None` for unpaged text
    #[serde(default)]
    pub page: Option<u32>,
    /// Exact chunk text
    pub snippet: String,
    /// Similarity score
    pub score: f32,
    /// Retrieval rank
    pub rank: usize,
}

impl Citation {
    pub fn from_retrieved(retrieved: &RetrievedChunk) -> Self {
        Self {
            chunk_id: retrieved.chunk.id,
            source_offset: retrieved.chunk.source_offset,
            page: retrieved.chunk.page,
            snippet: retrieved.chunk.text.clone(),
            score: retrieved.score,
            rank: retrieved.rank,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        let end = self.source_offset + self.snippet.chars().count();
        match self.page {
            Some(page) => format!(
                "[Section {}, page {}, chars {}-{}]",
                self.rank, page, self.source_offset, end
            ),
            None => format!("[Section {}, chars {}-{}]", self.rank, self.source_offset, end),
        }
    }
}

/// Response to a question about a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Document the question was asked against
    pub document_id: String,
    /// Generated answer
    pub answer: Answer,
    /// Snippets for each cited chunk, in rank order
    pub citations: Vec<Citation>,
    /// Number of chunks retrieved
    pub chunks_retrieved: usize,
    /// Number of chunks packed into the prompt
    pub chunks_used: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl QueryResponse {
    /// Build a response, keeping only citations for chunks the answer used
    pub fn new(
        document_id: impl Into<String>,
        answer: Answer,
        retrieved: &[RetrievedChunk],
        processing_time_ms: u64,
    ) -> Self {
        let citations: Vec<Citation> = answer
            .cited_chunk_ids
            .iter()
            .filter_map(|id| retrieved.iter().find(|r| r.chunk.id == *id))
            .map(Citation::from_retrieved)
            .collect();

        Self {
            document_id: document_id.into(),
            chunks_retrieved: retrieved.len(),
            chunks_used: answer.cited_chunk_ids.len(),
            answer,
            citations,
            processing_time_ms,
        }
    }

    /// Average similarity of the cited chunks
    pub fn confidence(&self) -> f32 {
        if self.citations.is_empty() {
            return 0.0;
        }
        self.citations.iter().map(|c| c.score).sum::<f32>() / self.citations.len() as f32
    }
}

/// Lifecycle status of a session index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Ready,
    NotReady,
}

/// Summary of a document session's index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub document_id: String,
    pub status: IndexStatus,
    pub chunk_count: usize,
    pub embedding_dimension: usize,
    pub embedding_model_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
