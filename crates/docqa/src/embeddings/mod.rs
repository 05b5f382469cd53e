//! Embedding gateway: batching, concurrency, retries and caching

mod cache;
mod gateway;

pub use cache::EmbeddingCache;
pub use gateway::EmbeddingGateway;
