//! HTTP and WebSocket server for Lectern.
//!
//! The network layer of the system: a WebSocket session layer at `/ws`
//! that brokers chat between clients and the query orchestrator, plus the
//! HTTP admin surface (health, model management, backend switching, RAG
//! ingestion/stats, agent endpoints).
//!
//! # Example
//!
//! ```ignore
//! use lectern_server::{AppState, Server};
//!
//! let state = AppState::new(llm, manual, framework, agent, settings);
//! Server::new(state).run().await?;
//! ```

pub mod error;
pub mod query;
pub mod routes;
pub mod state;

pub use error::{Result, ServerError};
pub use query::QueryError;
pub use routes::{ClientMessage, ServerEvent};
pub use state::{AppState, CatalogModel, MODEL_CATALOG};

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Lectern HTTP/WebSocket server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over a pre-built application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with every route and middleware attached.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health::routes())
            .merge(routes::models::routes())
            .merge(routes::system::routes())
            .merge(routes::rag::routes())
            .merge(routes::agents::routes())
            .route("/ws", get(routes::ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.settings.server.bind_address.clone();
        let router = self.router();

        info!(%addr, "Starting server");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Internal(format!("failed to bind {addr}: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("server error: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lectern_agent::{Agent, ToolRegistry};
    use lectern_config::Settings;
    use lectern_llm::{MockLlm, SharedLlm};
    use lectern_rag::{RagBackend, RagConfig, VectorStoreMode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let llm: SharedLlm = Arc::new(MockLlm::with_text("test"));
        let settings = Settings::default();
        let rag_config = RagConfig {
            embed_model: settings.llm.embedding_model.clone(),
            chunk_size: settings.rag.chunk_size,
            chunk_overlap: settings.rag.chunk_overlap,
            top_k: settings.rag.top_k,
            max_context_chars: settings.rag.max_context_chars,
        };
        let manual = RagBackend::manual(rag_config.clone(), llm.clone(), None).unwrap();
        let framework =
            RagBackend::framework(rag_config, llm.clone(), VectorStoreMode::Flat).unwrap();
        let agent = Agent::new(llm.clone(), "gemma:2b", ToolRegistry::with_defaults(), 5);
        AppState::new(llm, manual, framework, agent, settings)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = Server::new(test_state());
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = Server::new(test_state());
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
