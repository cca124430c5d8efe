//! HTTP route handlers, one module per surface.

pub mod agents;
pub mod health;
pub mod models;
pub mod rag;
pub mod system;
pub mod ws;

pub use ws::{ClientMessage, ServerEvent, ws_handler};
