//! Error types for ingestion and retrieval

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::FileId;

/// Result type alias for ocr-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion and retrieval errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed filename, empty payload or bad query parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Admission rejected because too many files are queued or parsing
    #[error("Processing queue is full ({active}/{limit} active); file {file_id} stays pending")]
    QueueFull {
        file_id: FileId,
        active: usize,
        limit: usize,
    },

    /// The extraction provider cannot handle this file type
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Rasterization or recognition failed beyond the CPU fallback
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Text store or vector index write failed
    #[error("Indexing failed: {0}")]
    Indexing(String),

    /// State, text or vector store is unreachable or rejected the operation
    #[error("Store error: {0}")]
    Store(String),

    /// Embedding provider could not encode the input
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(FileId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create an indexing error
    pub fn indexing(message: impl Into<String>) -> Self {
        Self::Indexing(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::QueueFull { .. } | Error::Store(_) | Error::Http(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::QueueFull { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "queue_full",
                self.to_string(),
            ),
            Error::UnsupportedFormat(ext) => (
                StatusCode::BAD_REQUEST,
                "unsupported_format",
                format!("Unsupported file format: {}", ext),
            ),
            Error::Extraction(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error", msg.clone())
            }
            Error::Indexing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "indexing_error", msg.clone()),
            Error::Store(msg) => (StatusCode::SERVICE_UNAVAILABLE, "store_error", msg.clone()),
            Error::Encoding(msg) => (StatusCode::BAD_GATEWAY, "encoding_error", msg.clone()),
            Error::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("File not found: {}", id),
            ),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
