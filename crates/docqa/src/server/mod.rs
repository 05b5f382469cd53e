//! HTTP server for document question answering

pub mod routes;
pub mod state;

use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::pipeline::ProviderHealth;
use state::AppState;

/// Document Q&A HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting docqa server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ProviderHealth {
        embedding,
        generation,
    } = state.pipeline().health().await;

    Json(serde_json::json!({
        "status": "ok",
        "documents": state.sessions().len(),
        "embedding_available": embedding,
        "generation_available": generation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingBackend;
    use crate::generation::Prompt;
    use crate::pipeline::RagPipeline;
    use crate::providers::{HashingEmbedder, LlmProvider};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, prompt: &Prompt) -> Result<String> {
            Ok(format!("echo: {}", prompt.user))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn router() -> Router {
        let mut config = RagConfig::default();
        config.embeddings.backend = EmbeddingBackend::Hashing;
        config.embeddings.dimensions = 64;
        config.storage.persist = false;
        config.chunking.chunk_size = 40;
        config.chunking.chunk_overlap = 5;

        let pipeline = RagPipeline::with_providers(
            config,
            Arc::new(HashingEmbedder::new(64).unwrap()),
            Arc::new(EchoLlm),
        )
        .unwrap();
        RagServer::from_state(AppState::from_pipeline(Arc::new(pipeline))).build_router()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_ask() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/documents")
                    .body(Body::from(
                        "Refunds are issued within thirty days. Shipping is free on large orders.",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let info = json_body(response).await;
        assert_eq!(info["status"], "ready");
        let id = info["document_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/api/documents/{}/ask", id))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question":"When are refunds issued?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let answer = json_body(response).await;
        assert_eq!(answer["answer"]["text"], "echo: When are refunds issued?");
        assert_eq!(answer["document_id"], id.as_str());
        assert!(!answer["citations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uploaded_document_is_listed() {
        let app = router();
        let text = "Support is available by email on weekdays between nine and five.";

        let response = app
            .clone()
            .oneshot(Request::post("/api/documents").body(Body::from(text)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let info = json_body(response).await;
        assert_eq!(info["chunk_count"], 2);
        assert_eq!(
            info["document_id"],
            RagPipeline::document_id_for(text.as_bytes()).as_str()
        );

        let response = app
            .oneshot(Request::get("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = json_body(response).await;
        assert_eq!(list["total_count"], 1);
        assert_eq!(list["documents"][0]["document_id"], info["document_id"]);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let response = router()
            .oneshot(
                Request::post("/api/documents/abc123/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question":"anything"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let response = router()
            .oneshot(Request::post("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["documents"], 0);
        assert_eq!(body["embedding_available"], true);
    }
}
