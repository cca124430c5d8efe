//! Deterministic mock backend for tests.
//!
//! Completions are scripted: each `generate`/`generate_stream` call pops the
//! next queued response (falling back to the default once the script runs
//! out). Embeddings are hash-seeded unit vectors, so the same text always
//! embeds to the same vector without any network dependency.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::client::{LlmBackend, TokenStream};
use crate::error::{LlmError, Result};
use crate::types::GenerationOptions;

/// Scripted LLM backend for tests.
pub struct MockLlm {
    responses: Mutex<VecDeque<String>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    dimensions: usize,
    embed_calls: Mutex<usize>,
    embed_failures_start_at: Option<usize>,
}

impl MockLlm {
    /// Create a mock that always answers with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: text.into(),
            prompts: Mutex::new(Vec::new()),
            dimensions: 8,
            embed_calls: Mutex::new(0),
            embed_failures_start_at: None,
        }
    }

    /// Create a mock that plays back `responses` in order, then repeats the
    /// last one.
    pub fn with_script(responses: Vec<String>) -> Self {
        let default_response = responses
            .last()
            .cloned()
            .unwrap_or_else(|| "ok".to_string());
        Self {
            responses: Mutex::new(responses.into()),
            default_response,
            ..Self::with_text("ok")
        }
    }

    /// Create a mock whose `embed` calls fail, for exercising ingest errors.
    pub fn failing_embeddings() -> Self {
        Self {
            embed_failures_start_at: Some(0),
            ..Self::with_text("ok")
        }
    }

    /// Create a mock whose `embed` calls succeed `n` times, then fail.
    pub fn embeddings_failing_after(n: usize) -> Self {
        Self {
            embed_failures_start_at: Some(n),
            ..Self::with_text("ok")
        }
    }

    /// Every prompt seen by `generate`/`generate_stream`, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

#[async_trait]
impl LlmBackend for MockLlm {
    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _options: GenerationOptions,
    ) -> Result<String> {
        Ok(self.next_response(prompt))
    }

    async fn generate_stream(
        &self,
        _model: &str,
        prompt: &str,
        _options: GenerationOptions,
    ) -> Result<TokenStream> {
        let response = self.next_response(prompt);
        // Split into word-sized deltas so consumers exercise reassembly.
        let deltas: Vec<Result<String>> = response
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(futures::stream::iter(deltas).boxed())
    }

    async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>> {
        let call = {
            let mut calls = self.embed_calls.lock().unwrap();
            let current = *calls;
            *calls += 1;
            current
        };
        if matches!(self.embed_failures_start_at, Some(n) if call >= n) {
            return Err(LlmError::Unavailable("mock embedding failure".to_string()));
        }

        // Deterministic pseudo-random unit vector seeded by the text hash.
        let mut state = hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];
        for value in embedding.iter_mut() {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            *value = ((state >> 16) as f32 / 32768.0) - 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["gemma:2b".to_string()])
    }

    async fn pull_model(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

fn hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}
