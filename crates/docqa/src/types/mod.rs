//! Core types for the question-answering pipeline

pub mod chunk;
pub mod response;
pub mod session;

pub use chunk::Chunk;
pub use response::{
    Answer, Citation, IndexInfo, IndexStatus, QueryResponse, QueryResult, RetrievedChunk,
};
pub use session::DocumentSession;
