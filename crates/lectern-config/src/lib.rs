//! Layered configuration.
//!
//! Precedence, highest wins: environment variables, then the YAML config
//! file, then compiled defaults. Every option has an uppercase environment
//! variable (`RAG_TOP_K`, `LLM_BASE_URL`, ...); booleans accept
//! `1/true/yes/on` and `0/false/no/off` case-insensitively.

pub mod error;

pub use error::{ConfigError, Result};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which RAG backend handles a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hand-rolled in-memory store with JSON persistence.
    Manual,
    /// Library-backed store (sqlite-vec).
    Framework,
}

impl BackendKind {
    /// Parse from the wire/config spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "framework" | "langchain" => Some(Self::Framework),
            _ => None,
        }
    }

    /// The canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Framework => "framework",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage mode for the framework backend's vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// In-memory only; lost on restart.
    Flat,
    /// On-disk under `vectorstore_path`; survives restart.
    Persistent,
}

impl VectorStoreKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "persistent" => Some(Self::Persistent),
            _ => None,
        }
    }
}

/// LLM runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Where to reach the runtime.
    pub base_url: String,
    /// Per-request deadline in seconds.
    pub timeout_seconds: u64,
    /// Default model for generation.
    pub generation_model: String,
    /// Model for embeddings; recorded in every index.
    pub embedding_model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_seconds: 120,
            generation_model: "gemma:2b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Retrieval settings shared by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Master switch; when false, every query gets a plain prompt.
    pub enabled: bool,
    /// Default retrieval depth.
    pub top_k: usize,
    /// Cap on assembled context length in characters.
    pub max_context_chars: usize,
    /// Chunk window size.
    pub chunk_size: usize,
    /// Chunk overlap.
    pub chunk_overlap: usize,
    /// Backend used when a session has not chosen one.
    pub backend_default: BackendKind,
    /// Storage mode for the framework backend.
    pub vectorstore: VectorStoreKind,
    /// Directory for the persistent index; the manual backend's JSON
    /// snapshot lives here as `rag_store.json`.
    pub vectorstore_path: PathBuf,
    /// Where to save raw uploaded files. `None` disables saving.
    pub upload_dir: Option<PathBuf>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 4,
            max_context_chars: 2000,
            chunk_size: 800,
            chunk_overlap: 200,
            backend_default: BackendKind::Manual,
            vectorstore: VectorStoreKind::Flat,
            vectorstore_path: PathBuf::from("data/vectorstore"),
            upload_dir: None,
        }
    }
}

/// Agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Per-run iteration cap.
    pub max_steps: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { max_steps: 5 }
    }
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address and port to bind.
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Complete application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// LLM runtime settings.
    pub llm: LlmSettings,
    /// RAG settings.
    pub rag: RagSettings,
    /// Agent settings.
    pub agent: AgentSettings,
    /// Server settings.
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings: defaults, overridden by the YAML file (the explicit
    /// path if given, otherwise `config/lectern.yaml` when present), then by
    /// the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match resolve_config_file(config_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env_from(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Parse settings from a YAML file, falling back to defaults for any
    /// missing section or key.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded config file");
        Ok(settings)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env_from<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECONDS") {
            self.llm.timeout_seconds = parse_env("LLM_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("LLM_GENERATION_MODEL") {
            self.llm.generation_model = v;
        }
        if let Some(v) = get("LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }

        if let Some(v) = get("RAG_ENABLED") {
            self.rag.enabled = parse_bool("RAG_ENABLED", &v)?;
        }
        if let Some(v) = get("RAG_TOP_K") {
            self.rag.top_k = parse_env("RAG_TOP_K", &v)?;
        }
        if let Some(v) = get("RAG_MAX_CONTEXT_CHARS") {
            self.rag.max_context_chars = parse_env("RAG_MAX_CONTEXT_CHARS", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_SIZE") {
            self.rag.chunk_size = parse_env("RAG_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_env("RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("RAG_BACKEND_DEFAULT") {
            self.rag.backend_default =
                BackendKind::parse(&v).ok_or_else(|| ConfigError::InvalidEnv {
                    var: "RAG_BACKEND_DEFAULT".to_string(),
                    message: format!("expected 'manual' or 'framework', got '{v}'"),
                })?;
        }
        if let Some(v) = get("RAG_VECTORSTORE") {
            self.rag.vectorstore =
                VectorStoreKind::parse(&v).ok_or_else(|| ConfigError::InvalidEnv {
                    var: "RAG_VECTORSTORE".to_string(),
                    message: format!("expected 'flat' or 'persistent', got '{v}'"),
                })?;
        }
        if let Some(v) = get("RAG_VECTORSTORE_PATH") {
            self.rag.vectorstore_path = PathBuf::from(v);
        }
        if let Some(v) = get("RAG_UPLOAD_DIR") {
            self.rag.upload_dir = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }

        if let Some(v) = get("AGENT_MAX_STEPS") {
            self.agent.max_steps = parse_env("AGENT_MAX_STEPS", &v)?;
        }

        if let Some(v) = get("SERVER_BIND_ADDRESS") {
            self.server.bind_address = v;
        }

        Ok(())
    }

    /// Validate cross-field constraints. Called once at startup; failure is
    /// fatal.
    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.base_url must not be empty".to_string()));
        }
        if self.llm.generation_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "llm.generation_model must not be empty".to_string(),
            ));
        }
        if self.llm.embedding_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "llm.embedding_model must not be empty".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be positive".to_string()));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_steps must be positive".to_string(),
            ));
        }
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.bind_address '{}' is not a valid socket address",
                self.server.bind_address
            )));
        }
        Ok(())
    }

    /// Path of the manual backend's JSON snapshot.
    pub fn manual_store_path(&self) -> PathBuf {
        self.rag.vectorstore_path.join("rag_store.json")
    }
}

fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    for candidate in ["config/lectern.yaml", "config/lectern.yml"] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        message: format!("could not parse '{value}'"),
    })
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.llm.base_url, "http://localhost:11434");
        assert_eq!(settings.rag.top_k, 4);
        assert_eq!(settings.rag.backend_default, BackendKind::Manual);
        assert_eq!(settings.agent.max_steps, 5);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "llm:\n  generation_model: phi3\nrag:\n  top_k: 8\n  backend_default: framework"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.llm.generation_model, "phi3");
        assert_eq!(settings.rag.top_k, 8);
        assert_eq!(settings.rag.backend_default, BackendKind::Framework);
        // Untouched keys keep their defaults.
        assert_eq!(settings.llm.timeout_seconds, 120);
        assert_eq!(settings.rag.chunk_size, 800);
    }

    #[test]
    fn test_env_wins_over_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rag:\n  top_k: 8").unwrap();

        let mut settings = Settings::from_file(file.path()).unwrap();
        settings
            .apply_env_from(env(&[("RAG_TOP_K", "2"), ("LLM_BASE_URL", "http://llm:9999")]))
            .unwrap();

        assert_eq!(settings.rag.top_k, 2);
        assert_eq!(settings.llm.base_url, "http://llm:9999");
    }

    #[test]
    fn test_bool_env_spellings() {
        for (value, expected) in [
            ("1", true),
            ("true", true),
            ("YES", true),
            ("on", true),
            ("0", false),
            ("False", false),
            ("no", false),
            ("off", false),
        ] {
            let mut settings = Settings::default();
            settings
                .apply_env_from(env(&[("RAG_ENABLED", value)]))
                .unwrap();
            assert_eq!(settings.rag.enabled, expected, "value {value:?}");
        }

        let mut settings = Settings::default();
        assert!(settings
            .apply_env_from(env(&[("RAG_ENABLED", "maybe")]))
            .is_err());
    }

    #[test]
    fn test_invalid_env_values_rejected() {
        let mut settings = Settings::default();
        assert!(settings
            .apply_env_from(env(&[("RAG_TOP_K", "lots")]))
            .is_err());

        let mut settings = Settings::default();
        assert!(settings
            .apply_env_from(env(&[("RAG_BACKEND_DEFAULT", "quantum")]))
            .is_err());
    }

    #[test]
    fn test_validation_rejects_bad_chunking() {
        let mut settings = Settings::default();
        settings.rag.chunk_overlap = 800;
        assert!(settings.validate().is_err());

        settings.rag.chunk_overlap = 900;
        assert!(settings.validate().is_err());

        settings.rag.chunk_overlap = 200;
        settings.rag.chunk_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_bind_address() {
        let mut settings = Settings::default();
        settings.server.bind_address = "not-an-address".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!(BackendKind::parse("manual"), Some(BackendKind::Manual));
        assert_eq!(BackendKind::parse("Framework"), Some(BackendKind::Framework));
        // Legacy wire spelling for the framework backend.
        assert_eq!(BackendKind::parse("langchain"), Some(BackendKind::Framework));
        assert_eq!(BackendKind::parse("other"), None);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(Settings::from_file(Path::new("/nonexistent/lectern.yaml")).is_err());
    }

    #[test]
    fn test_manual_store_path_under_vectorstore() {
        let settings = Settings::default();
        assert!(settings
            .manual_store_path()
            .ends_with("vectorstore/rag_store.json"));
    }
}
