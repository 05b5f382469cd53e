//! Vector index and its on-disk artifacts

mod store;
mod vector_index;

pub use store::IndexStore;
pub(crate) use store::short_id;
pub use vector_index::{
    cosine_similarity, l2_normalize, ArtifactChunk, IndexArtifact, VectorIndex,
    ARTIFACT_FORMAT_VERSION,
};
