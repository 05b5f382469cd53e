//! Exact cosine-similarity index over chunk vectors

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ingestion::Segmenter;
use crate::types::{Chunk, QueryResult};

/// Bumped when the artifact layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

/// In-memory index for a single document
///
/// Vectors are L2-normalised at build time so search is a plain inner
/// product. Search is exhaustive; at single-document scale this is both
/// exact and fast enough.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model_id: String,
    dimensions: usize,
    /// Segmentation the chunks were produced with, when known
    segmenter: Option<Segmenter>,
    chunks: Vec<Chunk>,
    normalized: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Create an empty index for vectors produced by `embedding_model_id`
    pub fn new(embedding_model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embedding_model_id: embedding_model_id.into(),
            dimensions,
            segmenter: None,
            chunks: Vec::new(),
            normalized: Vec::new(),
        }
    }

    /// Record the segmentation the chunks come from
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    /// Replace the index contents with `chunks`
    ///
    /// On error the previous contents are kept.
    pub fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let mut normalized = Vec::with_capacity(chunks.len());
        let mut seen = HashSet::with_capacity(chunks.len());

        for chunk in &chunks {
            if !seen.insert(chunk.id) {
                return Err(Error::InvalidInput(format!("duplicate chunk id {}", chunk.id)));
            }
            let vector = chunk.vector().ok_or_else(|| {
                Error::InvalidInput(format!("chunk {} has no vector", chunk.id))
            })?;
            if vector.len() != self.dimensions {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidInput(format!(
                    "chunk {} has a non-finite vector component",
                    chunk.id
                )));
            }
            normalized.push(l2_normalize(vector));
        }

        self.chunks = chunks;
        self.normalized = normalized;
        Ok(())
    }

    /// Top `k` chunks by descending cosine similarity, ties by lower chunk id
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<QueryResult>> {
        if k == 0 {
            return Err(Error::config("k must be greater than 0"));
        }
        if query_vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }
        if query_vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput(
                "query vector has a non-finite component".to_string(),
            ));
        }
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query = l2_normalize(query_vector);
        let mut scored: Vec<(u32, f32)> = self
            .chunks
            .iter()
            .zip(&self.normalized)
            // `+ 0.0` folds -0.0 into 0.0 so orthogonal chunks tie on id
            .map(|(chunk, vector)| (chunk.id, dot(&query, vector) + 0.0))
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (chunk_id, score))| QueryResult {
                chunk_id,
                score,
                rank: i + 1,
            })
            .collect())
    }

    /// Look up a chunk by id
    pub fn chunk(&self, id: u32) -> Option<&Chunk> {
        // Segmenter ids are dense and ordered, so try the direct slot first
        match self.chunks.get(id as usize) {
            Some(chunk) if chunk.id == id => Some(chunk),
            _ => self.chunks.iter().find(|c| c.id == id),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedding_model_id(&self) -> &str {
        &self.embedding_model_id
    }

    pub fn segmenter(&self) -> Option<Segmenter> {
        self.segmenter
    }

    /// Drop all chunks and vectors
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.normalized.clear();
    }

    /// Serializable snapshot of the raw vectors and chunk metadata
    pub fn to_artifact(&self, document_id: &str) -> IndexArtifact {
        IndexArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            document_id: document_id.to_string(),
            embedding_model_id: self.embedding_model_id.clone(),
            dimensions: self.dimensions,
            chunk_size: self.segmenter.map_or(0, |s| s.chunk_size()),
            chunk_overlap: self.segmenter.map_or(0, |s| s.overlap()),
            chunks: self
                .chunks
                .iter()
                .map(|chunk| ArtifactChunk {
                    chunk_id: chunk.id,
                    text: chunk.text.clone(),
                    source_offset: chunk.source_offset,
                    page: chunk.page,
                    vector: chunk
                        .vector()
                        .unwrap_or_default()
                        .iter()
                        .map(|&x| f64::from(x))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rebuild an index from an artifact, checking it against the configured model
    pub fn from_artifact(
        artifact: IndexArtifact,
        expected_model_id: &str,
        expected_dimensions: usize,
    ) -> Result<Self> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported index format version {}",
                artifact.format_version
            )));
        }
        if artifact.embedding_model_id != expected_model_id {
            return Err(Error::ModelMismatch {
                expected: expected_model_id.to_string(),
                found: artifact.embedding_model_id,
            });
        }
        if artifact.dimensions != expected_dimensions {
            return Err(Error::DimensionMismatch {
                expected: expected_dimensions,
                actual: artifact.dimensions,
            });
        }

        let chunks = artifact
            .chunks
            .into_iter()
            .map(|c| {
                let vector = c.vector.into_iter().map(|x| x as f32).collect();
                Chunk::new(c.chunk_id, c.text, c.source_offset)
                    .on_page(c.page)
                    .with_vector(vector)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut index = Self::new(artifact.embedding_model_id, artifact.dimensions);
        // 0/0 marks an index built outside the segmenter
        index.segmenter = Segmenter::new(artifact.chunk_size, artifact.chunk_overlap).ok();
        index.build(chunks)?;
        Ok(index)
    }
}

/// On-disk form of a [`VectorIndex`]
///
/// Vectors are widened to f64 so the JSON text round-trips every f32 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub format_version: u32,
    pub document_id: String,
    pub embedding_model_id: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<ArtifactChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactChunk {
    pub chunk_id: u32,
    pub text: String,
    pub source_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub vector: Vec<f64>,
}

fn rank_order(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Scale to unit length; the zero vector stays zero
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec![0.0; vector.len()];
    }
    vector.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two equal-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(&l2_normalize(a), &l2_normalize(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u32, vector: Vec<f32>) -> Chunk {
        Chunk::new(id, format!("chunk {}", id), id as usize * 100)
            .with_vector(vector)
            .unwrap()
    }

    fn five_chunk_index() -> VectorIndex {
        let mut index = VectorIndex::new("test-model", 3);
        index
            .build(vec![
                chunk(0, vec![1.0, 0.0, 0.0]),
                chunk(1, vec![0.0, 1.0, 0.0]),
                chunk(2, vec![0.0, 0.0, 1.0]),
                chunk(3, vec![0.9, 0.4, 0.1]),
                chunk(4, vec![-1.0, 0.0, 0.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_query_equal_to_chunk_vector_ranks_it_first() {
        let index = five_chunk_index();
        let results = index.search(&[0.9, 0.4, 0.1], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, 3);
        assert_eq!(results[0].rank, 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].chunk_id, 0);
        assert_eq!(results[1].rank, 2);
        assert!(results[1].score < results[0].score);
    }

    #[test]
    fn test_magnitude_is_ignored() {
        let index = five_chunk_index();
        let results = index.search(&[9.0, 4.0, 1.0], 1).unwrap();
        assert_eq!(results[0].chunk_id, 3);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ties_broken_by_lower_id() {
        let mut index = VectorIndex::new("m", 2);
        index
            .build(vec![
                chunk(2, vec![1.0, 0.0]),
                chunk(0, vec![2.0, 0.0]),
                chunk(1, vec![0.0, 1.0]),
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }

    #[test]
    fn test_k_clamped_to_len() {
        let index = five_chunk_index();
        let results = index.search(&[0.0, 1.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 5);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(results.last().unwrap().chunk_id, 4);
    }

    #[test]
    fn test_partial_selection_matches_full_sort() {
        let index = five_chunk_index();
        let query = [0.3, 0.5, 0.2];
        let full = index.search(&query, 5).unwrap();
        for k in 1..=5 {
            let partial = index.search(&query, k).unwrap();
            assert_eq!(partial, full[..k].to_vec());
        }
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = VectorIndex::new("m", 3);
        assert!(index.search(&[1.0, 0.0, 0.0], 4).unwrap().is_empty());
    }

    #[test]
    fn test_zero_k_rejected() {
        let index = five_chunk_index();
        let err = index.search(&[1.0, 0.0, 0.0], 0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let mut index = five_chunk_index();
        let err = index
            .build(vec![chunk(0, vec![1.0, 0.0, 0.0]), chunk(1, vec![1.0, 0.0])])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        // Previous contents survive a failed rebuild
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_build_rejects_unvectorized_chunk() {
        let mut index = VectorIndex::new("m", 2);
        assert!(index.build(vec![Chunk::new(0, "text", 0)]).is_err());
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = five_chunk_index();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let mut index = VectorIndex::new("m", 2);
        index.build(vec![chunk(0, vec![0.0, 0.0])]).unwrap();
        let results = index.search(&[1.0, 1.0], 1).unwrap();
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_artifact_roundtrip_preserves_rankings() {
        let index = five_chunk_index();
        let query = [0.31, -0.2, 0.77];

        let json = serde_json::to_string(&index.to_artifact("doc")).unwrap();
        let artifact: IndexArtifact = serde_json::from_str(&json).unwrap();
        let reloaded = VectorIndex::from_artifact(artifact, "test-model", 3).unwrap();

        assert_eq!(reloaded.chunks(), index.chunks());
        assert_eq!(
            reloaded.search(&query, 5).unwrap(),
            index.search(&query, 5).unwrap()
        );
    }

    #[test]
    fn test_artifact_records_segmentation_and_pages() {
        let segmenter = Segmenter::new(500, 50).unwrap();
        let mut index = VectorIndex::new("test-model", 2).with_segmenter(segmenter);
        index
            .build(vec![Chunk::new(0, "on page two", 0)
                .on_page(Some(2))
                .with_vector(vec![1.0, 0.0])
                .unwrap()])
            .unwrap();

        let artifact = index.to_artifact("doc");
        assert_eq!(artifact.format_version, ARTIFACT_FORMAT_VERSION);
        assert_eq!((artifact.chunk_size, artifact.chunk_overlap), (500, 50));
        assert_eq!(artifact.chunks[0].page, Some(2));

        let reloaded = VectorIndex::from_artifact(artifact, "test-model", 2).unwrap();
        assert_eq!(reloaded.segmenter(), Some(segmenter));
        assert_eq!(reloaded.chunk(0).unwrap().page, Some(2));
    }

    #[test]
    fn test_artifact_without_segmentation_reloads_as_unknown() {
        let artifact = five_chunk_index().to_artifact("doc");
        assert_eq!((artifact.chunk_size, artifact.chunk_overlap), (0, 0));
        let reloaded = VectorIndex::from_artifact(artifact, "test-model", 3).unwrap();
        assert!(reloaded.segmenter().is_none());
    }

    #[test]
    fn test_older_format_version_rejected() {
        let mut artifact = five_chunk_index().to_artifact("doc");
        artifact.format_version = 1;
        let err = VectorIndex::from_artifact(artifact, "test-model", 3).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_artifact_from_other_model_rejected() {
        let artifact = five_chunk_index().to_artifact("doc");
        let err = VectorIndex::from_artifact(artifact, "other-model", 3).unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_artifact_with_other_dimension_rejected() {
        let artifact = five_chunk_index().to_artifact("doc");
        let err = VectorIndex::from_artifact(artifact, "test-model", 4).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_lookup_by_id() {
        let index = five_chunk_index();
        assert_eq!(index.chunk(3).unwrap().source_offset, 300);
        assert!(index.chunk(9).is_none());
    }
}
