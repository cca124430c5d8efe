//! Health probe.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Where the LLM runtime is expected.
    pub llm_base_url: String,
    /// Currently selected generation model.
    pub generation_model: String,
    /// Embedding model used by the indices.
    pub embedding_model: String,
    /// Whether retrieval is enabled.
    pub rag_enabled: bool,
    /// Live WebSocket connections.
    pub active_connections: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        llm_base_url: state.settings.llm.base_url.clone(),
        generation_model: state.current_model().await,
        embedding_model: state.settings.llm.embedding_model.clone(),
        rag_enabled: state.settings.rag.enabled,
        active_connections: state.connection_count().await,
    })
}

/// Create the health route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
