//! `/api/bundles*` — custom bundle registry.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ServerError;
use crate::server::AppState;

use super::RequireAuth;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bundles", get(list_bundles))
        .route("/bundles/validate", post(validate_bundle))
        .route("/bundles/custom", post(register_bundle))
        .route("/bundles/custom/{name}", axum::routing::delete(remove_bundle))
        .route("/bundles/{name}", get(get_bundle))
}

#[derive(Deserialize)]
struct RegisterBundle {
    uri: String,
    name: String,
    #[serde(default)]
    description: String,
}

async fn list_bundles(_auth: RequireAuth, State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let prefs = state.preferences.get()?;
    Ok(Json(json!({ "bundles": prefs.custom_bundles })))
}

async fn get_bundle(_auth: RequireAuth, State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ServerError> {
    let prefs = state.preferences.get()?;
    prefs
        .custom_bundles
        .into_iter()
        .find(|b| b.name == name)
        .map(|entry| Json(json!({ "bundle": entry })))
        .ok_or_else(|| ServerError::Settings(flowgate_settings::SettingsError::NotFound(name)))
}

async fn register_bundle(_auth: RequireAuth, State(state): State<AppState>, Json(body): Json<RegisterBundle>) -> Result<Json<Value>, ServerError> {
    state.preferences.validate_uri(&body.uri)?;
    state.preferences.add_custom_bundle(flowgate_settings::RegistryEntry { uri: body.uri, name: body.name, description: body.description })?;
    Ok(Json(json!({ "ok": true })))
}

async fn remove_bundle(_auth: RequireAuth, State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ServerError> {
    state.preferences.remove_custom_bundle(&name)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ValidateUri {
    uri: String,
}

async fn validate_bundle(_auth: RequireAuth, State(state): State<AppState>, Json(body): Json<ValidateUri>) -> Result<Json<Value>, ServerError> {
    state.preferences.validate_uri(&body.uri)?;
    Ok(Json(json!({ "valid": true })))
}
