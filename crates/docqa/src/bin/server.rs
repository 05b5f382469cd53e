//! docqa server binary
//!
//! Run with: cargo run -p docqa --bin docqa-server

use docqa::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Provider: {:?}", config.provider);
    tracing::info!(
        "  - Embedding model: {} ({:?}, {} dims)",
        config.embeddings.model,
        config.embeddings.backend,
        config.embeddings.dimensions
    );
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Index dir: {}", config.storage.index_dir.display());

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST   /api/documents          - Upload a document");
    println!("  POST   /api/documents/:id/ask  - Ask a question");
    println!("  GET    /api/documents          - List documents");
    println!("  DELETE /api/documents/:id      - Clear a document index");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
