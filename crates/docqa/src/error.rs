//! Error types for the question-answering pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad parameters; fatal to the operation
    InvalidConfig,
    /// Embedding model unreachable, timed out or rejected the request
    EmbeddingUnavailable,
    /// Generation model unreachable, timed out or rejected the request
    GenerationUnavailable,
    /// Vectors of the wrong dimension or from a different model
    DimensionMismatch,
    /// Query issued before the session index was built
    IndexNotReady,
    /// Malformed document or request
    InvalidInput,
    /// Unknown document session
    NotFound,
    /// Persisted index could not be read or written
    Storage,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable identifier used in structured error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::EmbeddingUnavailable => "embedding_unavailable",
            ErrorKind::GenerationUnavailable => "generation_unavailable",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::IndexNotReady => "index_not_ready",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding model failure
    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Generation model failure; the question is kept so the caller can retry
    #[error("Generation model unavailable: {message}")]
    GenerationUnavailable { message: String, question: String },

    /// Vector dimension does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index was built with a different embedding model
    #[error("Embedding model mismatch: index built with '{found}', configured '{expected}'")]
    ModelMismatch { expected: String, found: String },

    /// Session index is not ready for queries
    #[error("Index not ready for document {0}")]
    IndexNotReady(String),

    /// Text extraction failed
    #[error("Failed to extract text: {0}")]
    Extraction(String),

    /// Malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown document session
    #[error("Document session not found: {0}")]
    SessionNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(message.into())
    }

    /// Create a generation error for `question`
    pub fn generation(message: impl Into<String>, question: impl Into<String>) -> Self {
        Self::GenerationUnavailable {
            message: message.into(),
            question: question.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach the question to a generation failure so callers can retry it
    pub fn with_question(self, question: &str) -> Self {
        match self {
            Error::GenerationUnavailable { message, .. } => Error::GenerationUnavailable {
                message,
                question: question.to_string(),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            Error::GenerationUnavailable { .. } => ErrorKind::GenerationUnavailable,
            Error::DimensionMismatch { .. } | Error::ModelMismatch { .. } => {
                ErrorKind::DimensionMismatch
            }
            Error::IndexNotReady(_) => ErrorKind::IndexNotReady,
            Error::Extraction(_) | Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::SessionNotFound(_) => ErrorKind::NotFound,
            Error::Io(_) | Error::Json(_) => ErrorKind::Storage,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// External dependency failures are worth retrying; everything else is deterministic
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EmbeddingUnavailable | ErrorKind::GenerationUnavailable
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::InvalidConfig | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::EmbeddingUnavailable | ErrorKind::GenerationUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::DimensionMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::IndexNotReady => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut error = json!({
            "type": kind.as_str(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        });
        if let Error::GenerationUnavailable { question, .. } = &self {
            error["question"] = json!(question);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
