//! Error types for the retrieval pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::RetrievalStrategy;

/// Result type alias for page-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Retrieval pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document could not be turned into page images
    #[error("Failed to rasterize '{document}': {message}")]
    Rasterization { document: String, message: String },

    /// Image summarization call failed
    #[error("Summarization failed: {0}")]
    Summarization(String),

    /// Text or visual encoder failed or returned an unusable embedding
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// One strategy indexed a page and the other failed on the same page
    #[error(
        "Document '{document_id}' partially indexed: page {page_number} is in the {indexed} index \
         but {failed} indexing failed: {source}"
    )]
    PartialIndex {
        document_id: String,
        page_number: u32,
        indexed: RetrievalStrategy,
        failed: RetrievalStrategy,
        #[source]
        source: Box<Error>,
    },

    /// Persisted index and metadata log disagree
    #[error("Index '{index}' is corrupted: {message}")]
    IndexCorruption { index: String, message: String },

    /// Chat model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Binary (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

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
    /// Create a rasterization error
    pub fn rasterization(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rasterization {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Create a summarization error
    pub fn summarization(message: impl Into<String>) -> Self {
        Self::Summarization(message.into())
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Create an index corruption error
    pub fn corruption(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexCorruption {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether re-running the same call may succeed
    ///
    /// External model failures are transient; bad input and corrupted
    /// indices are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Summarization(_) | Error::Encoding(_) | Error::Llm(_) | Error::Http(_) => true,
            Error::PartialIndex { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(err: bincode::error::EncodeError) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(err: bincode::error::DecodeError) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Rasterization { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "rasterization_error"),
            Error::Summarization(_) => (StatusCode::BAD_GATEWAY, "summarization_error"),
            Error::Encoding(_) => (StatusCode::BAD_GATEWAY, "encoding_error"),
            Error::PartialIndex { .. } => (StatusCode::CONFLICT, "partial_index_error"),
            Error::IndexCorruption { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_corruption_error")
            }
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_index_reports_both_strategies() {
        let err = Error::PartialIndex {
            document_id: "report".to_string(),
            page_number: 2,
            indexed: RetrievalStrategy::SummaryEmbedding,
            failed: RetrievalStrategy::VisualMultiVector,
            source: Box::new(Error::encoding("service unavailable")),
        };

        let message = err.to_string();
        assert!(message.contains("report"));
        assert!(message.contains("page 2"));
        assert!(message.contains("summary_embedding"));
        assert!(message.contains("visual_multi_vector"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_corruption_is_not_retryable() {
        let err = Error::corruption("summary", "3 metadata entries but 2 vectors");
        assert!(!err.is_retryable());
        assert!(!Error::rasterization("bad.pdf", "not a pdf").is_retryable());
    }
}
