//! Error types for the server crate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type alias using the server error type.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors surfaced through the HTTP admin plane.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Ingestion or retrieval failed.
    #[error(transparent)]
    Rag(#[from] lectern_rag::RagError),

    /// The LLM runtime failed.
    #[error(transparent)]
    Llm(#[from] lectern_llm::LlmError),

    /// The request itself was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// Startup/bind failure.
    #[error("server error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            // Document problems are the caller's fault; everything else on
            // the ingest path (embedding, storage) is on our side.
            ServerError::Rag(e) => match e {
                lectern_rag::RagError::UnsupportedFormat(_)
                | lectern_rag::RagError::EmptyDocument(_)
                | lectern_rag::RagError::Parse { .. }
                | lectern_rag::RagError::Config(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Llm(_) => StatusCode::BAD_GATEWAY,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ServerError::Rag(lectern_rag::RagError::UnsupportedFormat("x.bin".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ServerError::Llm(lectern_llm::LlmError::Timeout { seconds: 1 });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ServerError::Rag(lectern_rag::RagError::Index("broken".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
