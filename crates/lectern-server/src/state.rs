//! Application state shared across handlers.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use lectern_agent::Agent;
use lectern_config::{BackendKind, Settings};
use lectern_llm::SharedLlm;
use lectern_rag::RagBackend;

/// One entry of the static model catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogModel {
    /// Model identifier used with the runtime.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Approximate download size.
    pub size: &'static str,
    /// Short description.
    pub description: &'static str,
}

/// Generation models the admin surface offers for switching.
pub const MODEL_CATALOG: [CatalogModel; 4] = [
    CatalogModel {
        id: "gemma:2b",
        name: "Gemma 2B",
        size: "1.7 GB",
        description: "Google's efficient model, great for general conversations",
    },
    CatalogModel {
        id: "phi3",
        name: "Phi-3 Mini",
        size: "2.3 GB",
        description: "Microsoft's small model, excellent reasoning capabilities",
    },
    CatalogModel {
        id: "llama3.2:1b",
        name: "Llama 3.2 1B",
        size: "1.3 GB",
        description: "Meta's compact model, fast and efficient",
    },
    CatalogModel {
        id: "qwen2.5:1.5b",
        name: "Qwen 2.5 1.5B",
        size: "934 MB",
        description: "Alibaba's multilingual model, supports many languages",
    },
];

/// Application state shared across all handlers and WebSocket sessions.
#[derive(Clone)]
pub struct AppState {
    /// The LLM runtime client.
    pub llm: SharedLlm,

    /// The manual RAG backend.
    pub manual: Arc<RagBackend>,

    /// The framework RAG backend.
    pub framework: Arc<RagBackend>,

    /// The agent instance behind `/api/agents/agent1`.
    pub agent: Arc<Agent>,

    /// Loaded settings.
    pub settings: Arc<Settings>,

    /// Currently selected generation model; switched at runtime via the
    /// model admin endpoints.
    current_model: Arc<RwLock<String>>,

    /// Default backend for sessions that have not chosen one.
    current_backend: Arc<RwLock<BackendKind>>,

    /// Live WebSocket connections.
    connections: Arc<RwLock<HashSet<Uuid>>>,
}

impl AppState {
    /// Assemble the application state.
    pub fn new(
        llm: SharedLlm,
        manual: RagBackend,
        framework: RagBackend,
        agent: Agent,
        settings: Settings,
    ) -> Self {
        let current_model = settings.llm.generation_model.clone();
        let current_backend = settings.rag.backend_default;
        Self {
            llm,
            manual: Arc::new(manual),
            framework: Arc::new(framework),
            agent: Arc::new(agent),
            settings: Arc::new(settings),
            current_model: Arc::new(RwLock::new(current_model)),
            current_backend: Arc::new(RwLock::new(current_backend)),
            connections: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Resolve a backend singleton by kind.
    pub fn backend(&self, kind: BackendKind) -> &Arc<RagBackend> {
        match kind {
            BackendKind::Manual => &self.manual,
            BackendKind::Framework => &self.framework,
        }
    }

    /// The currently selected generation model.
    pub async fn current_model(&self) -> String {
        self.current_model.read().await.clone()
    }

    /// Switch the current generation model.
    pub async fn set_current_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(model = %model, "Switched generation model");
        *self.current_model.write().await = model;
    }

    /// The process-wide default backend selector.
    pub async fn current_backend(&self) -> BackendKind {
        *self.current_backend.read().await
    }

    /// Switch the default backend selector.
    pub async fn set_current_backend(&self, kind: BackendKind) {
        tracing::info!(backend = %kind, "Switched default RAG backend");
        *self.current_backend.write().await = kind;
    }

    /// Register a live connection; returns the current count.
    pub async fn register_connection(&self, id: Uuid) -> usize {
        let mut connections = self.connections.write().await;
        connections.insert(id);
        connections.len()
    }

    /// Deregister a connection; returns the remaining count.
    pub async fn deregister_connection(&self, id: Uuid) -> usize {
        let mut connections = self.connections.write().await;
        connections.remove(&id);
        connections.len()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Write uploaded bytes under the configured upload directory, keyed by
    /// the original filename (collisions overwrite). A failure here is
    /// logged but never fails the ingestion.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) {
        let Some(dir) = &self.settings.rag.upload_dir else {
            return;
        };
        // Strip any path components a client might smuggle in.
        let name = std::path::Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join(&name), bytes)
        };
        match write() {
            Ok(()) => tracing::info!(dir = %dir.display(), file = %name, "Saved upload"),
            Err(e) => tracing::warn!(error = %e, file = %name, "Failed to save upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_agent::ToolRegistry;
    use lectern_llm::MockLlm;
    use lectern_rag::{RagBackend, RagConfig, VectorStoreMode};

    pub(crate) fn test_state() -> AppState {
        let llm: SharedLlm = Arc::new(MockLlm::with_text("test response"));
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
        let agent = Agent::new(
            llm.clone(),
            settings.llm.generation_model.clone(),
            ToolRegistry::with_defaults(),
            settings.agent.max_steps,
        );
        AppState::new(llm, manual, framework, agent, settings)
    }

    #[tokio::test]
    async fn test_model_switching() {
        let state = test_state();
        assert_eq!(state.current_model().await, "gemma:2b");
        state.set_current_model("phi3").await;
        assert_eq!(state.current_model().await, "phi3");
    }

    #[tokio::test]
    async fn test_backend_switching() {
        let state = test_state();
        assert_eq!(state.current_backend().await, BackendKind::Manual);
        state.set_current_backend(BackendKind::Framework).await;
        assert_eq!(state.current_backend().await, BackendKind::Framework);
    }

    #[tokio::test]
    async fn test_connection_registry() {
        let state = test_state();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(state.register_connection(a).await, 1);
        assert_eq!(state.register_connection(b).await, 2);
        assert_eq!(state.deregister_connection(a).await, 1);
        assert_eq!(state.connection_count().await, 1);
    }

    #[test]
    fn test_catalog_has_default_model() {
        assert!(MODEL_CATALOG.iter().any(|m| m.id == "gemma:2b"));
    }
}
