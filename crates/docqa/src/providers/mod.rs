//! Provider abstractions for embeddings and answer generation
//!
//! The pipeline only sees the traits; which backend serves them is picked
//! from [`RagConfig`] by [`build_providers`].

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, ProviderKind, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use hashing::{HashingEmbedder, HASHING_MODEL_ID};
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder};

/// Embedding and generation providers selected by configuration
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
}

/// Construct the configured providers
pub fn build_providers(config: &RagConfig) -> Result<Providers> {
    let embed_model = config.embeddings.model.clone();
    let dims = config.embeddings.dimensions;

    let (remote_embedder, llm): (Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>) =
        match config.provider {
            ProviderKind::OpenAi => {
                let client = Arc::new(OpenAiClient::from_config(&config.llm)?);
                (
                    Arc::new(OpenAiEmbedder::new(client.clone(), embed_model, dims)),
                    Arc::new(OpenAiChat::new(client, &config.llm)),
                )
            }
            ProviderKind::Ollama => {
                let client = Arc::new(OllamaClient::new(&config.llm)?);
                (
                    Arc::new(OllamaEmbedder::new(client.clone(), embed_model, dims)),
                    Arc::new(OllamaLlm::new(client, &config.llm)),
                )
            }
        };

    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
        EmbeddingBackend::Provider => remote_embedder,
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(dims)?),
    };

    tracing::info!(
        "Using {} embeddings ({}, {} dims) and {} generation ({})",
        embedder.name(),
        embedder.model_id(),
        embedder.dimensions(),
        llm.name(),
        llm.model()
    );

    Ok(Providers { embedder, llm })
}
