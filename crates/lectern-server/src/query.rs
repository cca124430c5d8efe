//! Query orchestrator.
//!
//! The single place that decides between a plain prompt and a
//! retrieval-augmented one, assembles the context under the configured
//! budget, and opens the generation stream. Retrieval failures abort the
//! turn — there is no silent fallback to a plain prompt — and the
//! orchestrator never retries an LLM failure.

use thiserror::Error;

use lectern_config::BackendKind;
use lectern_llm::{GenerationOptions, TokenStream};

use crate::state::AppState;

/// System preamble for every chat prompt.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant. Provide clear, concise, and \
     accurate responses. Prefer factual, sourced answers when context is provided.";

/// Instruction inserted ahead of retrieved context.
pub const RAG_INSTRUCTION: &str = "You are given retrieved context from a knowledge base. Use it \
     to answer the question.\nIf the answer isn't in the context, say you don't know.";

/// Why a turn failed before any delta was produced.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Retrieval failed (embedding or index).
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] lectern_rag::RagError),

    /// The generation call failed to open.
    #[error(transparent)]
    Generation(#[from] lectern_llm::LlmError),
}

/// Answer a user message as a stream of text deltas.
///
/// The RAG path is taken only when retrieval is enabled, the session has an
/// active source filter, and the selected backend holds chunks matching it;
/// otherwise the prompt is plain.
pub async fn answer(
    state: &AppState,
    message: &str,
    backend_kind: BackendKind,
    sources: Option<&[String]>,
) -> Result<TokenStream, QueryError> {
    let backend = state.backend(backend_kind);
    let settings = &state.settings;

    let filter = sources.filter(|s| !s.is_empty());
    let use_rag = settings.rag.enabled
        && filter.is_some()
        && backend.matching_chunks(filter)? > 0;

    let prompt = if use_rag {
        let (context, hits) = backend
            .build_context(message, settings.rag.top_k, filter)
            .await?;

        tracing::info!(
            backend = backend.name(),
            sources = ?filter,
            hits = hits.len(),
            context_chars = context.chars().count(),
            "RAG context enabled"
        );

        if context.is_empty() {
            plain_prompt(message)
        } else {
            rag_prompt(&context, message)
        }
    } else {
        tracing::info!(
            backend = backend.name(),
            sources = ?filter,
            "RAG context disabled for this turn"
        );
        plain_prompt(message)
    };

    let model = state.current_model().await;
    let stream = state
        .llm
        .generate_stream(&model, &prompt, GenerationOptions::default())
        .await?;
    Ok(stream)
}

fn plain_prompt(message: &str) -> String {
    format!("{SYSTEM_PREAMBLE}\n\nUser: {message}\nAssistant:")
}

fn rag_prompt(context: &str, message: &str) -> String {
    format!(
        "{SYSTEM_PREAMBLE}\n\n{RAG_INSTRUCTION}\n\nContext:\n{context}\n\nUser: {message}\nAssistant:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use futures::StreamExt;
    use lectern_agent::{Agent, ToolRegistry};
    use lectern_config::Settings;
    use lectern_llm::{MockLlm, SharedLlm};
    use lectern_rag::{RagBackend, RagConfig, VectorStoreMode};
    use std::sync::Arc;

    fn state_with_mock(mock: MockLlm) -> (AppState, Arc<MockLlm>) {
        let mock = Arc::new(mock);
        let llm: SharedLlm = mock.clone();
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
        (
            AppState::new(llm, manual, framework, agent, settings),
            mock,
        )
    }

    async fn collect(stream: TokenStream) -> String {
        stream
            .filter_map(|d| async { d.ok() })
            .collect::<Vec<_>>()
            .await
            .join("")
    }

    #[tokio::test]
    async fn test_plain_chat_without_sources() {
        let (state, mock) = state_with_mock(MockLlm::with_text("The answer is 4."));

        let stream = answer(&state, "What is 2+2?", BackendKind::Manual, None)
            .await
            .unwrap();
        let text = collect(stream).await;

        assert!(text.contains('4'));
        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(SYSTEM_PREAMBLE));
        assert!(prompts[0].contains("User: What is 2+2?"));
        assert!(!prompts[0].contains("Context:"));
    }

    #[tokio::test]
    async fn test_rag_prompt_carries_ingested_context() {
        let (state, mock) = state_with_mock(MockLlm::with_text("The secret code is BANANA-7."));

        for kind in [BackendKind::Manual, BackendKind::Framework] {
            state
                .backend(kind)
                .ingest_text("The secret code is BANANA-7.", "secret.txt")
                .await
                .unwrap();

            let sources = vec!["secret.txt".to_string()];
            let stream = answer(&state, "What is the secret code?", kind, Some(&sources))
                .await
                .unwrap();
            let text = collect(stream).await;
            assert!(text.contains("BANANA-7"));
        }

        let prompts = mock.prompts();
        let generation_prompts: Vec<_> = prompts
            .iter()
            .filter(|p| p.contains("Assistant:"))
            .collect();
        assert_eq!(generation_prompts.len(), 2);
        for prompt in generation_prompts {
            assert!(prompt.contains("Context:"));
            assert!(prompt.contains("Source: secret.txt"));
            assert!(prompt.contains("BANANA-7"));
        }
    }

    #[tokio::test]
    async fn test_filter_isolates_sources() {
        let (state, mock) = state_with_mock(MockLlm::with_text("Mittens"));
        let backend = state.backend(BackendKind::Manual);
        backend
            .ingest_text("The cat's name is Mittens.", "cats.txt")
            .await
            .unwrap();
        backend
            .ingest_text("The dog's name is Rex.", "dogs.txt")
            .await
            .unwrap();

        let sources = vec!["cats.txt".to_string()];
        let stream = answer(
            &state,
            "What is the pet's name?",
            BackendKind::Manual,
            Some(&sources),
        )
        .await
        .unwrap();
        collect(stream).await;

        let prompt = mock.prompts().last().unwrap().clone();
        assert!(prompt.contains("Mittens"));
        assert!(!prompt.contains("Rex"));
    }

    #[tokio::test]
    async fn test_unknown_source_filter_falls_back_to_plain() {
        let (state, mock) = state_with_mock(MockLlm::with_text("plain answer"));
        state
            .backend(BackendKind::Manual)
            .ingest_text("indexed text", "known.txt")
            .await
            .unwrap();

        let sources = vec!["unknown.txt".to_string()];
        let stream = answer(&state, "anything", BackendKind::Manual, Some(&sources))
            .await
            .unwrap();
        collect(stream).await;

        let prompt = mock.prompts().last().unwrap().clone();
        assert!(!prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn test_rag_disabled_globally_uses_plain_prompt() {
        let (mut state, mock) = state_with_mock(MockLlm::with_text("plain"));
        let mut settings = (*state.settings).clone();
        settings.rag.enabled = false;
        state.settings = Arc::new(settings);

        state
            .backend(BackendKind::Manual)
            .ingest_text("indexed text", "doc.txt")
            .await
            .unwrap();

        let sources = vec!["doc.txt".to_string()];
        let stream = answer(&state, "anything", BackendKind::Manual, Some(&sources))
            .await
            .unwrap();
        collect(stream).await;

        let prompt = mock.prompts().last().unwrap().clone();
        assert!(!prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn test_retrieval_error_aborts_turn() {
        // The embedder works for the single ingest call, then fails, so the
        // query-time embedding errors out mid-RAG path.
        let (state, _mock) = state_with_mock(MockLlm::embeddings_failing_after(1));
        state
            .backend(BackendKind::Manual)
            .ingest_text("some text", "doc.txt")
            .await
            .unwrap();

        let sources = vec!["doc.txt".to_string()];
        let result = answer(&state, "question", BackendKind::Manual, Some(&sources)).await;

        // No silent fallback to a plain prompt: the turn fails.
        assert!(matches!(result, Err(QueryError::Retrieval(_))));
    }
}
