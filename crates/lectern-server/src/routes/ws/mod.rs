//! WebSocket endpoint for real-time chat.
//!
//! - `protocol` — wire types (`ClientMessage`, `ServerEvent`)
//! - `connection` — connection lifecycle and the per-message protocol

mod connection;
mod protocol;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::state::AppState;

pub use protocol::{ClientMessage, ServerEvent};

/// GET /ws — WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state))
}
