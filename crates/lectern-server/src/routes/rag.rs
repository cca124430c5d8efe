//! RAG ingestion, stats, and preview endpoints.
//!
//! The unified endpoints under `/api/rag/` write into *both* backends
//! best-effort and report each backend's outcome separately; the
//! `/api/rag/{backend}/` family targets one backend and surfaces its errors
//! with real status codes.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::{Json, Router, routing::get, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use lectern_config::BackendKind;
use lectern_rag::{RagBackend, parse_document};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Request body for the ingest_text endpoints.
#[derive(Debug, Deserialize)]
struct IngestTextRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: Option<String>,
}

/// Request body for the preview endpoints.
#[derive(Debug, Deserialize)]
struct PreviewRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    sources: Option<Vec<String>>,
    #[serde(default)]
    top_k: Option<usize>,
}

fn resolve_backend(state: &AppState, name: &str) -> Result<Arc<RagBackend>> {
    let kind = BackendKind::parse(name)
        .ok_or_else(|| ServerError::BadRequest(format!("unknown backend '{name}'")))?;
    Ok(state.backend(kind).clone())
}

/// Pull the uploaded file out of a multipart body.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let filename = field.file_name().unwrap_or("uploaded").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("could not read upload: {e}")))?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ServerError::BadRequest("no file field in upload".to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Unified endpoints (both backends)
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/rag/stats — aggregate stats from both backends.
async fn unified_stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let manual = state.manual.stats()?;
    let framework = state.framework.stats()?;
    Ok(Json(json!({
        "enabled": state.settings.rag.enabled,
        "manual": manual,
        "framework": framework,
    })))
}

async fn ingest_text_into_both(state: &AppState, text: &str, source: &str) -> Json<Value> {
    let manual = state.manual.ingest_text(text, source).await;
    let framework = state.framework.ingest_text(text, source).await;

    let outcome = |result: lectern_rag::Result<usize>| match result {
        Ok(added) => json!({ "added_chunks": added }),
        Err(e) => json!({ "error": e.to_string() }),
    };

    let success = manual.is_ok() || framework.is_ok();
    Json(json!({
        "success": success,
        "source": source,
        "manual": outcome(manual),
        "framework": outcome(framework),
    }))
}

/// POST /api/rag/ingest_text — index raw text in both backends.
async fn unified_ingest_text(
    State(state): State<AppState>,
    Json(request): Json<IngestTextRequest>,
) -> Json<Value> {
    if request.text.trim().is_empty() {
        return Json(json!({ "success": false, "message": "No text provided" }));
    }
    let source = request.source.unwrap_or_else(|| "uploaded".to_string());
    ingest_text_into_both(&state, &request.text, &source).await
}

/// POST /api/rag/ingest_file — parse an upload and index it in both
/// backends.
async fn unified_ingest_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let (filename, bytes) = read_upload(multipart).await?;

    tracing::info!(filename = %filename, bytes = bytes.len(), "File upload received");

    state.save_upload(&filename, &bytes);
    let text = parse_document(&filename, &bytes)?;

    Ok(ingest_text_into_both(&state, &text, &filename).await)
}

/// POST /api/rag/preview — preview retrieved context (manual backend).
async fn unified_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<Value>> {
    preview_on(&state.manual, &state, request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-backend endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/rag/{backend}/stats
async fn backend_stats(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<Value>> {
    let backend = resolve_backend(&state, &backend)?;
    let stats = backend.stats()?;
    Ok(Json(json!({
        "enabled": state.settings.rag.enabled,
        "system": backend.name(),
        "chunks": stats.chunks,
        "sources": stats.sources,
        "embed_model": stats.embed_model,
    })))
}

/// POST /api/rag/{backend}/ingest_text
async fn backend_ingest_text(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Json(request): Json<IngestTextRequest>,
) -> Result<Json<Value>> {
    let backend = resolve_backend(&state, &backend)?;
    if request.text.trim().is_empty() {
        return Ok(Json(json!({ "success": false, "message": "No text provided" })));
    }
    let source = request.source.unwrap_or_else(|| "uploaded".to_string());
    let added = backend.ingest_text(&request.text, &source).await?;
    Ok(Json(json!({
        "success": true,
        "added_chunks": added,
        "source": source,
        "system": backend.name(),
    })))
}

/// POST /api/rag/{backend}/ingest_file
async fn backend_ingest_file(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let backend = resolve_backend(&state, &backend)?;
    let (filename, bytes) = read_upload(multipart).await?;

    tracing::info!(
        filename = %filename,
        bytes = bytes.len(),
        system = backend.name(),
        "File upload received"
    );

    state.save_upload(&filename, &bytes);
    let added = backend.ingest_file(&filename, &bytes).await?;

    if added == 0 {
        return Ok(Json(json!({
            "success": false,
            "message": "No chunks indexed (file may be empty)",
        })));
    }

    Ok(Json(json!({
        "success": true,
        "added_chunks": added,
        "source": filename,
        "system": backend.name(),
    })))
}

/// POST /api/rag/{backend}/preview
async fn backend_preview(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<Value>> {
    let backend = resolve_backend(&state, &backend)?;
    preview_on(&backend, &state, request).await
}

async fn preview_on(
    backend: &RagBackend,
    state: &AppState,
    request: PreviewRequest,
) -> Result<Json<Value>> {
    let query = request.query.trim();
    if query.is_empty() {
        return Ok(Json(json!({ "success": false, "message": "No query provided" })));
    }

    let top_k = request.top_k.unwrap_or(state.settings.rag.top_k);
    let sources = request.sources.filter(|s| !s.is_empty());

    let (context, hits) = backend
        .build_context(query, top_k, sources.as_deref())
        .await?;

    let preview: String = context.chars().take(1000).collect();
    Ok(Json(json!({
        "success": true,
        "sources": sources,
        "top_k": top_k,
        "retrieved_chunks": hits.len(),
        "context_preview": preview,
        "context_chars": context.chars().count(),
        "system": backend.name(),
    })))
}

/// Create the RAG routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rag/stats", get(unified_stats))
        .route("/api/rag/ingest_text", post(unified_ingest_text))
        .route("/api/rag/ingest_file", post(unified_ingest_file))
        .route("/api/rag/preview", post(unified_preview))
        .route("/api/rag/{backend}/stats", get(backend_stats))
        .route("/api/rag/{backend}/ingest_text", post(backend_ingest_text))
        .route("/api/rag/{backend}/ingest_file", post(backend_ingest_file))
        .route("/api/rag/{backend}/preview", post(backend_preview))
}
