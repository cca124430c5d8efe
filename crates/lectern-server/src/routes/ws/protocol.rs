//! WebSocket protocol types for client-server chat.

use serde::{Deserialize, Serialize};

/// A chat message from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    /// The user's message text.
    #[serde(default)]
    pub message: String,

    /// Active source filter for retrieval. Missing means no RAG filter.
    #[serde(default)]
    pub sources: Option<Vec<String>>,

    /// Backend selector: `true` picks the framework backend, `false` the
    /// manual one. Missing keeps the session's current selector.
    #[serde(rename = "useLangchain", default)]
    pub use_framework: Option<bool>,
}

/// An event sent to the client. Every event is `{type, message}` on the
/// wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Operational notice (connected, model loaded, file indexed).
    System {
        /// The notice text.
        message: String,
    },
    /// Echo of the user's own message, for UI rendering.
    User {
        /// The echoed text.
        message: String,
    },
    /// Progress indicator while the assistant generates.
    Typing {
        /// The indicator text.
        message: String,
    },
    /// A piece of the assistant's response.
    Ai {
        /// The response text delta.
        message: String,
    },
    /// A recoverable failure for this turn; the session stays open.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl ServerEvent {
    /// Create a system event.
    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Create a user echo event.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Create a typing event.
    pub fn typing(message: impl Into<String>) -> Self {
        Self::Typing {
            message: message.into(),
        }
    }

    /// Create an AI delta event.
    pub fn ai(message: impl Into<String>) -> Self {
        Self::Ai {
            message: message.into(),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
