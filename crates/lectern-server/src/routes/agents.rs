//! Agent endpoints.
//!
//! Agent failures stay inside the payload (`success: false`) rather than
//! becoming HTTP errors; the trace is always returned so callers can see
//! how far the run got.

use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use lectern_agent::check_guardrails;

use crate::state::AppState;

/// GET /api/agents/agent1/info
async fn agent_info(State(state): State<AppState>) -> Json<Value> {
    Json(state.agent.info())
}

/// GET /api/agents/agent1/tools
async fn agent_tools(State(state): State<AppState>) -> Json<Value> {
    let tools = state.agent.tool_descriptors();
    Json(json!({
        "count": tools.len(),
        "tools": tools,
    }))
}

/// Request body for POST /api/agents/agent1/query.
#[derive(Debug, Deserialize)]
struct AgentQueryRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reset_history: bool,
}

/// POST /api/agents/agent1/query
async fn agent_query(
    State(state): State<AppState>,
    Json(request): Json<AgentQueryRequest>,
) -> Json<Value> {
    let message = request.message.trim();
    if message.is_empty() {
        return Json(json!({ "success": false, "error": "No message provided" }));
    }

    if let Some(reason) = check_guardrails(message) {
        tracing::info!("Agent query blocked by guardrails");
        return Json(json!({ "success": false, "error": reason }));
    }

    if request.reset_history {
        state.agent.reset().await;
    }

    match state.agent.run(message).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "answer": outcome.answer,
            "steps": outcome.trace,
            "tools_used": outcome.tools_used,
            "iterations": outcome.iterations,
            "capped": outcome.capped,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Agent query failed");
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

/// POST /api/agents/agent1/reset
async fn agent_reset(State(state): State<AppState>) -> Json<Value> {
    state.agent.reset().await;
    Json(json!({
        "success": true,
        "message": "Agent conversation history reset",
    }))
}

/// Create the agent routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/agents/agent1/info", get(agent_info))
        .route("/api/agents/agent1/tools", get(agent_tools))
        .route("/api/agents/agent1/query", post(agent_query))
        .route("/api/agents/agent1/reset", post(agent_reset))
}
