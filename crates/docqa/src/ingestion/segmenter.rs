//! Fixed-window text segmentation with overlap
//!
//! Windows are measured in Unicode scalar values (`char`s) and every
//! `source_offset` is a char index into the extracted text.

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::extractor::ExtractedText;

/// Splits text into overlapping windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    /// Window size in characters
    chunk_size: usize,
    /// Characters shared by consecutive chunks
    overlap: usize,
}

impl Segmenter {
    /// Create a segmenter; `overlap` must be smaller than `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Characters between consecutive chunk starts
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Segment `text` in a single pass
    ///
    /// The last chunk may be shorter than `chunk_size`; it is kept as is.
    /// Segmentation stops at the first window that reaches the end of the
    /// text, so no chunk is contained entirely in its predecessor.
    pub fn segment(&self, text: &str) -> Vec<Chunk> {
        // Byte position of every char, plus the end of the string
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::with_capacity(total / self.step() + 1);
        let mut start = 0usize;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            chunks.push(Chunk::new(
                chunks.len() as u32,
                &text[bounds[start]..bounds[end]],
                start,
            ));
            if end == total {
                break;
            }
            start += self.step();
        }

        tracing::debug!(
            "Segmented {} chars into {} chunks (size {}, overlap {})",
            total,
            chunks.len(),
            self.chunk_size,
            self.overlap
        );
        chunks
    }

    /// Segment extracted text, tagging each chunk with the page it starts on
    pub fn segment_document(&self, document: &ExtractedText) -> Vec<Chunk> {
        self.segment(&document.text)
            .into_iter()
            .map(|chunk| {
                let page = document.page_at(chunk.source_offset);
                chunk.on_page(page)
            })
            .collect()
    }
}

/// Segment `text` into windows of `chunk_size` chars sharing `overlap` chars
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Segmenter::new(chunk_size, overlap)?.segment(text))
}
