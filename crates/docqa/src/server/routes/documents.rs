//! Document upload and management endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::IndexInfo;

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<IndexInfo>,
    pub total_count: usize,
}

/// POST /api/documents - Upload and index a document
pub async fn upload_document(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IndexInfo>)> {
    tracing::info!("Received document upload ({} bytes)", body.len());
    let info = state.sessions().upload(body).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /api/documents - List all document sessions
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents = state.sessions().list();
    let total_count = documents.len();
    Json(DocumentListResponse {
        documents,
        total_count,
    })
}

/// GET /api/documents/:id - Index status for one document
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IndexInfo>> {
    Ok(Json(state.sessions().info(&id)?))
}

/// DELETE /api/documents/:id - Drop the session and its persisted index
pub async fn clear_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.sessions().clear_index(&id)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "document_id": id,
    })))
}
