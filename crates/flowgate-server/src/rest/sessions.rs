//! `GET /api/sessions*` — active session listing, persisted history, and
//! per-session artifacts.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use flowgate_core::SessionId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ServerError;
use crate::server::AppState;

use super::RequireAuth;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_active))
        .route("/sessions/history", get(list_history))
        .route("/sessions/history/{id}/transcript", get(get_transcript))
        .route("/sessions/history/{id}/rename", axum::routing::put(rename_session))
        .route("/sessions/history/{id}", axum::routing::delete(delete_session))
        .route("/sessions/{id}/artifacts", get(get_artifacts))
}

/// Currently mounted, active sessions, not the full persisted history.
async fn list_active(_auth: RequireAuth, State(state): State<AppState>) -> Json<Value> {
    let ids: Vec<String> = state.session_manager.active_ids().iter().map(SessionId::as_str).map(str::to_owned).collect();
    Json(json!({ "sessions": ids }))
}

async fn list_history(_auth: RequireAuth, State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let records = state.session_manager.list()?;
    Ok(Json(json!({ "sessions": records })))
}

async fn get_transcript(_auth: RequireAuth, State(state): State<AppState>, Path(id): Path<SessionId>) -> Result<Json<Value>, ServerError> {
    let transcript = flowgate_events::TranscriptStore::new(state.config.state_root.clone())
        .load_transcript(&id)
        .map_err(flowgate_runtime::RuntimeError::from)?;
    Ok(Json(json!({ "sessionId": id.as_str(), "transcript": transcript })))
}

#[derive(Deserialize)]
struct RenameBody {
    name: String,
}

async fn rename_session(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(body): Json<RenameBody>,
) -> Result<Json<Value>, ServerError> {
    let record = state.session_manager.rename(&id, &body.name)?;
    Ok(Json(json!({ "session": record })))
}

async fn delete_session(_auth: RequireAuth, State(state): State<AppState>, Path(id): Path<SessionId>) -> Result<Json<Value>, ServerError> {
    state.session_manager.delete(&id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn get_artifacts(_auth: RequireAuth, State(state): State<AppState>, Path(id): Path<SessionId>) -> Json<Value> {
    Json(json!({ "artifacts": state.artifacts.list(&id) }))
}
