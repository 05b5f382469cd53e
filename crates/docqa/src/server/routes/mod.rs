//! API routes

pub mod documents;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            post(documents::upload_document)
                .get(documents::list_documents)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::clear_document),
        )
        .route("/documents/:id/ask", post(query::ask_question))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "docqa",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over a single uploaded document with chunk citations",
        "endpoints": {
            "POST /api/documents": "Upload a PDF or UTF-8 text document (raw body)",
            "GET /api/documents": "List indexed documents",
            "GET /api/documents/:id": "Index status for a document",
            "DELETE /api/documents/:id": "Drop a document session and its persisted index",
            "POST /api/documents/:id/ask": "Ask a question: {\"question\": \"...\"}"
        }
    }))
}
