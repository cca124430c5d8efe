//! Model catalog and model switching.

use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::state::{AppState, MODEL_CATALOG};

/// GET /api/models — static catalog merged with live availability.
async fn list_models(State(state): State<AppState>) -> Json<Value> {
    // Live availability is best-effort: an unreachable runtime leaves every
    // catalog entry marked unavailable rather than failing the listing.
    let live = match state.llm.list_models().await {
        Ok(models) => Some(models),
        Err(e) => {
            tracing::warn!(error = %e, "Could not list models from the runtime");
            None
        }
    };

    let mut available_models = serde_json::Map::new();
    for model in MODEL_CATALOG {
        let pulled = live
            .as_ref()
            .map(|names| names.iter().any(|n| n == model.id))
            .unwrap_or(false);
        available_models.insert(
            model.id.to_string(),
            json!({
                "name": model.name,
                "size": model.size,
                "description": model.description,
                "available": pulled,
            }),
        );
    }

    Json(json!({
        "current_model": state.current_model().await,
        "available_models": available_models,
        "runtime_reachable": live.is_some(),
    }))
}

/// Request body for POST /api/models/load.
#[derive(Debug, Deserialize)]
struct LoadModelRequest {
    model: Option<String>,
}

/// POST /api/models/load — pull a model on the runtime and make it current.
async fn load_model(
    State(state): State<AppState>,
    Json(request): Json<LoadModelRequest>,
) -> Json<Value> {
    let Some(model) = request.model.filter(|m| !m.trim().is_empty()) else {
        return Json(json!({
            "success": false,
            "message": "No model provided",
        }));
    };

    if !MODEL_CATALOG.iter().any(|m| m.id == model) {
        let known: Vec<&str> = MODEL_CATALOG.iter().map(|m| m.id).collect();
        return Json(json!({
            "success": false,
            "message": format!("Invalid model. Available models: {}", known.join(", ")),
        }));
    }

    match state.llm.pull_model(&model).await {
        Ok(()) => {
            state.set_current_model(&model).await;
            Json(json!({
                "success": true,
                "message": format!("Model {model} loaded successfully"),
                "current_model": model,
            }))
        }
        Err(e) => Json(json!({
            "success": false,
            "message": format!("Failed to load model: {e}"),
        })),
    }
}

/// Create the model admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(list_models))
        .route("/api/models/load", post(load_model))
}
