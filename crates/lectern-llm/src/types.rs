//! Wire types for the LLM runtime's HTTP API.

use serde::{Deserialize, Serialize};

/// Sampling options sent with every generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum number of tokens to generate.
    pub num_predict: u32,
    /// Stop sequences that terminate generation.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            num_predict: 200,
            stop: vec![
                "\nUser:".to_string(),
                "User:".to_string(),
                "\n\n\n".to_string(),
            ],
        }
    }
}

impl GenerationOptions {
    /// Low-temperature options used by the agent loop, where consistent
    /// formatting matters more than variety.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.1,
            num_predict: 300,
            stop: Vec::new(),
            ..Self::default()
        }
    }
}

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model name to generate with.
    pub model: String,
    /// The full prompt string.
    pub prompt: String,
    /// Whether the response should be streamed as JSON frames.
    pub stream: bool,
    /// Sampling options.
    pub options: GenerationOptions,
}

/// One frame of a generation response.
///
/// With `stream: false` the runtime sends a single frame carrying the full
/// text; with `stream: true` it sends a newline-delimited sequence of frames
/// terminated by one with `done: true`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateFrame {
    /// The text delta (or full text for non-streaming responses).
    #[serde(default)]
    pub response: String,
    /// Whether this is the terminal frame.
    #[serde(default)]
    pub done: bool,
}

/// Request body for `POST /api/embeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsRequest {
    /// Embedding model name.
    pub model: String,
    /// The text to embed.
    pub prompt: String,
}

/// Response body for `POST /api/embeddings`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsResponse {
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

/// One entry in the runtime's local model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    /// Model name, e.g. `gemma:2b`.
    pub name: String,
}

/// Response body for `GET /api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    /// Locally available models.
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// Request body for `POST /api/pull`.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequest {
    /// Model name to pull.
    pub name: String,
    /// Pull synchronously rather than streaming progress frames.
    pub stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_serialize() {
        let opts = GenerationOptions::default();
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["num_predict"], 200);
        assert_eq!(json["stop"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_deterministic_options_omit_stop() {
        let opts = GenerationOptions::deterministic();
        assert_eq!(opts.temperature, 0.1);
        let json = serde_json::to_value(&opts).unwrap();
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn test_generate_frame_defaults() {
        let frame: GenerateFrame = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(frame.response, "hi");
        assert!(!frame.done);

        let frame: GenerateFrame = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(frame.response.is_empty());
        assert!(frame.done);
    }
}
