//! The [`LlmBackend`] trait and the HTTP client for the local runtime.
//!
//! The trait is the seam between everything that needs text generation or
//! embeddings and the concrete transport. [`OllamaClient`] talks to a local
//! Ollama-compatible runtime; [`crate::MockLlm`] stands in for it in tests.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;

use crate::error::{LlmError, Result};
use crate::types::{
    EmbeddingsRequest, EmbeddingsResponse, GenerateFrame, GenerateRequest, GenerationOptions,
    PullRequest, TagsResponse,
};

/// A lazy, finite, non-restartable sequence of generated text deltas.
///
/// Dropping the stream before exhaustion drops the underlying HTTP request,
/// cancelling the in-flight generation on the runtime side.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Backend abstraction over the LLM runtime.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a complete response for the prompt.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String>;

    /// Generate a response as a stream of text deltas.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<TokenStream>;

    /// Embed a single text, returning whatever dimension the model produces.
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>>;

    /// List models available on the runtime.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Ask the runtime to pull (download/load) a model by name.
    async fn pull_model(&self, name: &str) -> Result<()>;
}

/// A shared LLM backend handle.
pub type SharedLlm = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for an Ollama-compatible runtime.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout_seconds: u64,
}

impl OllamaClient {
    /// Create a client against the given base URL with a per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(LlmError::Config("base URL must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout_seconds,
        })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Protocol(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options,
        };

        tracing::debug!(model, prompt_chars = prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout_seconds))?;

        let response = Self::check_status(response).await?;
        let frame: GenerateFrame = response
            .json()
            .await
            .map_err(|e| LlmError::Protocol(format!("malformed generate response: {e}")))?;

        Ok(frame.response)
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<TokenStream> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: true,
            options,
        };

        tracing::debug!(model, prompt_chars = prompt.len(), "Opening generate stream");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout_seconds))?;

        let response = Self::check_status(response).await?;
        let timeout_seconds = self.timeout_seconds;
        let mut bytes = response.bytes_stream();

        // The runtime emits newline-delimited JSON frames. Frames may be
        // split across chunk boundaries, so buffer raw bytes until a full
        // line arrives.
        let stream = try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| LlmError::from_transport(e, timeout_seconds))?;
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = &line[..line.len() - 1];
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let frame: GenerateFrame = serde_json::from_slice(line)
                        .map_err(|e| LlmError::Protocol(format!("malformed stream frame: {e}")))?;
                    if !frame.response.is_empty() {
                        yield frame.response;
                    }
                    if frame.done {
                        break 'outer;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(self.url("/api/embeddings"))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout_seconds))?;

        let response = Self::check_status(response).await?;
        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Protocol(format!("malformed embeddings response: {e}")))?;

        if parsed.embedding.is_empty() {
            return Err(LlmError::Protocol(
                "embeddings response contained an empty vector".to_string(),
            ));
        }

        Ok(parsed.embedding)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout_seconds))?;

        let response = Self::check_status(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Protocol(format!("malformed tags response: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self, name: &str) -> Result<()> {
        let request = PullRequest {
            name: name.to_string(),
            stream: false,
        };

        tracing::info!(model = name, "Pulling model on the runtime");

        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout_seconds))?;

        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 120).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.url("/api/generate"), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_client_rejects_empty_base_url() {
        assert!(matches!(
            OllamaClient::new("", 120),
            Err(LlmError::Config(_))
        ));
    }
}
