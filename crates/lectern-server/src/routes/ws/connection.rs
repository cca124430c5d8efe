//! WebSocket connection lifecycle and the per-message chat protocol.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use lectern_config::BackendKind;

use super::protocol::{ClientMessage, ServerEvent};
use crate::query;
use crate::state::AppState;

/// Handle one WebSocket connection for its whole lifetime.
///
/// Messages on a connection are handled strictly in order: the `user` echo
/// and all `ai`/`error` events for one message precede anything for the
/// next. A failed send means the client is gone; the loop exits, which
/// drops any in-flight generation stream and with it the underlying LLM
/// request.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();

    let active = state.register_connection(conn_id).await;
    tracing::debug!(connection_id = %conn_id, active, "WebSocket connection established");

    // Per-session state: the backend selector starts at the process-wide
    // default and sticks once the client picks one explicitly.
    let mut session_backend = state.current_backend().await;

    let welcome = ServerEvent::system(
        "Connected to chat server. Type your message to chat with the AI.",
    );
    if send_event(&mut sender, &welcome).await.is_err() {
        state.deregister_connection(conn_id).await;
        return;
    }

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Ping(data)) => {
                let _ = sender.send(Message::Pong(data)).await;
                continue;
            }
            Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                // Text frames only on this protocol.
                let event = ServerEvent::error("Binary frames are not supported");
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
                continue;
            }
            Err(e) => {
                tracing::warn!(connection_id = %conn_id, "WebSocket error: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(_) => {
                let event = ServerEvent::error("Invalid message format");
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if process_message(client_msg, &mut session_backend, &mut sender, &state)
            .await
            .is_err()
        {
            break;
        }
    }

    let remaining = state.deregister_connection(conn_id).await;
    tracing::debug!(connection_id = %conn_id, remaining, "WebSocket connection closed");
}

/// Run the per-message protocol: echo, typing, orchestrate, stream back.
///
/// Returns `Err` only when the socket itself failed, which ends the
/// connection; turn-level failures are reported as `error` events and the
/// session stays open.
async fn process_message(
    msg: ClientMessage,
    session_backend: &mut BackendKind,
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
) -> Result<(), axum::Error> {
    let user_message = msg.message.trim().to_string();
    if user_message.is_empty() {
        return Ok(());
    }

    if let Some(use_framework) = msg.use_framework {
        *session_backend = if use_framework {
            BackendKind::Framework
        } else {
            BackendKind::Manual
        };
    }
    let backend = *session_backend;

    let sources = msg.sources.filter(|s| !s.is_empty());

    tracing::info!(
        backend = %backend,
        sources = ?sources,
        preview = %user_message.chars().take(80).collect::<String>(),
        "Chat message received"
    );

    send_event(sender, &ServerEvent::user(&user_message)).await?;
    send_event(
        sender,
        &ServerEvent::typing(format!("AI is typing... ({backend} system)")),
    )
    .await?;

    let stream = match query::answer(state, &user_message, backend, sources.as_deref()).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Turn failed before generation started");
            send_event(sender, &ServerEvent::error(e.to_string())).await?;
            return Ok(());
        }
    };

    let mut stream = std::pin::pin!(stream);
    while let Some(delta) = stream.next().await {
        match delta {
            Ok(text) => send_event(sender, &ServerEvent::ai(text)).await?,
            Err(e) => {
                tracing::warn!(error = %e, "Generation stream failed mid-turn");
                send_event(sender, &ServerEvent::error(e.to_string())).await?;
                break;
            }
        }
    }

    Ok(())
}

/// Serialize and send one event.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
