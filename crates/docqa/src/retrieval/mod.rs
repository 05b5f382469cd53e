//! Retrieval of relevant chunks for a question

mod retriever;

pub use retriever::Retriever;
