//! Per-document session handle

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::index::VectorIndex;

use super::chunk::Chunk;
use super::response::{IndexInfo, IndexStatus};

/// One uploaded document and its index
///
/// A ready session is only constructed from a completely built (or
/// successfully reloaded) index, and the index is never mutated afterwards,
/// so clones share it freely and concurrent searches need no locking.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    document_id: String,
    index: Arc<VectorIndex>,
    index_ready: bool,
    created_at: DateTime<Utc>,
}

impl DocumentSession {
    /// Session over a fully built index
    pub fn ready(document_id: impl Into<String>, index: VectorIndex) -> Self {
        Self {
            document_id: document_id.into(),
            index: Arc::new(index),
            index_ready: true,
            created_at: Utc::now(),
        }
    }

    /// Session registered before its index has been built
    pub fn pending(
        document_id: impl Into<String>,
        embedding_model_id: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            index: Arc::new(VectorIndex::new(embedding_model_id, dimensions)),
            index_ready: false,
            created_at: Utc::now(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn embedding_model_id(&self) -> &str {
        self.index.embedding_model_id()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn index_ready(&self) -> bool {
        self.index_ready
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Chunks in document order
    pub fn chunks(&self) -> &[Chunk] {
        self.index.chunks()
    }

    pub fn chunk(&self, id: u32) -> Option<&Chunk> {
        self.index.chunk(id)
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            document_id: self.document_id.clone(),
            status: if self.index_ready {
                IndexStatus::Ready
            } else {
                IndexStatus::NotReady
            },
            chunk_count: self.index.len(),
            embedding_dimension: self.index.dimensions(),
            embedding_model_id: self.index.embedding_model_id().to_string(),
            created_at: self.created_at,
        }
    }
}
