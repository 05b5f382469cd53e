//! Chunk type with source offsets for citations

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A contiguous window of document text
///
/// Created by the segmenter without a vector; the embedding gateway attaches
/// one exactly once, after which the chunk is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in document order, starting at 0
    pub id: u32,
    /// Chunk text
    pub text: String,
    /// Starting character index in the extracted document text
    pub source_offset: usize,
    /// 1-based page the chunk starts on, for paged documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Embedding vector, once attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
}

impl Chunk {
    /// Create an unvectorized chunk
    pub fn new(id: u32, text: impl Into<String>, source_offset: usize) -> Self {
        Self {
            id,
            text: text.into(),
            source_offset,
            page: None,
            vector: None,
        }
    }

    /// Tag the chunk with the page it starts on
    pub fn on_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    /// Attach an embedding vector
    pub fn with_vector(mut self, vector: Vec<f32>) -> Result<Self> {
        if self.vector.is_some() {
            return Err(Error::InvalidInput(format!(
                "chunk {} already has a vector",
                self.id
            )));
        }
        self.vector = Some(vector);
        Ok(self)
    }

    pub fn vector(&self) -> Option<&[f32]> {
        self.vector.as_deref()
    }

    pub fn is_vectorized(&self) -> bool {
        self.vector.is_some()
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Exclusive end character index
    pub fn end_offset(&self) -> usize {
        self.source_offset + self.char_len()
    }

    /// Drop the vector, keeping text and position
    pub fn without_vector(&self) -> Self {
        Self::new(self.id, self.text.clone(), self.source_offset).on_page(self.page)
    }
}
