//! RAG backend selector endpoints.

use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use lectern_config::BackendKind;

use crate::state::AppState;

/// GET /api/system/current — the active default backend.
async fn current_system(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "current_system": state.current_backend().await.as_str(),
        "available_systems": ["manual", "framework"],
    }))
}

/// Request body for POST /api/system/switch.
#[derive(Debug, Deserialize)]
struct SwitchRequest {
    system: Option<String>,
}

/// POST /api/system/switch — change the default backend.
async fn switch_system(
    State(state): State<AppState>,
    Json(request): Json<SwitchRequest>,
) -> Json<Value> {
    let requested = request.system.unwrap_or_default();
    let Some(kind) = BackendKind::parse(&requested) else {
        return Json(json!({
            "success": false,
            "message": "Invalid system. Choose 'manual' or 'framework'",
        }));
    };

    state.set_current_backend(kind).await;
    Json(json!({
        "success": true,
        "current_system": kind.as_str(),
        "message": format!("Switched to {kind} system"),
    }))
}

/// Create the system selector routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/system/current", get(current_system))
        .route("/api/system/switch", post(switch_system))
}
