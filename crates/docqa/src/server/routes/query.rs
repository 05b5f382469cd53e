//! Question endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::QueryResponse;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// POST /api/documents/:id/ask - Answer a question about an uploaded document
pub async fn ask_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<QueryResponse>> {
    tracing::info!("Query: \"{}\"", request.question);
    let response = state.sessions().ask(&id, &request.question).await?;
    Ok(Json(response))
}
