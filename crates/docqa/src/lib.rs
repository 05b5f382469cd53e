//! # docqa
//!
//! Question answering over a single uploaded document.
//!
//! ## Pipeline
//!
//! 1. Extract text from the upload (PDF or UTF-8 text)
//! 2. Split it into overlapping character windows
//! 3. Embed every chunk through a batching, retrying gateway
//! 4. Build an exact cosine-similarity index, persisted per document
//! 5. For each question: embed, take the top-k chunks, pack them into the
//!    context budget and ask the generation model to answer from them only
//!
//! Answers carry the ids of the chunks they were conditioned on, and the
//! HTTP layer returns those chunks as citations.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::RagPipeline;
pub use server::RagServer;
pub use session::SessionRegistry;
pub use types::{Answer, Chunk, Citation, DocumentSession, IndexInfo, QueryResponse};
