//! `/api/behaviors*` — custom behavior registry. Mirrors [`super::bundles`].

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
        .route("/behaviors", get(list_behaviors))
        .route("/behaviors/validate", post(validate_behavior))
        .route("/behaviors/custom", post(register_behavior))
        .route("/behaviors/custom/{name}", axum::routing::delete(remove_behavior))
        .route("/behaviors/{name}", get(get_behavior))
}

#[derive(Deserialize)]
struct RegisterBehavior {
    uri: String,
    name: String,
    #[serde(default)]
    description: String,
}

async fn list_behaviors(_auth: RequireAuth, State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let prefs = state.preferences.get()?;
    Ok(Json(json!({ "behaviors": prefs.custom_behaviors })))
}

async fn get_behavior(_auth: RequireAuth, State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ServerError> {
    let prefs = state.preferences.get()?;
    prefs
        .custom_behaviors
        .into_iter()
        .find(|b| b.name == name)
        .map(|entry| Json(json!({ "behavior": entry })))
        .ok_or_else(|| ServerError::Settings(flowgate_settings::SettingsError::NotFound(name)))
}

async fn register_behavior(_auth: RequireAuth, State(state): State<AppState>, Json(body): Json<RegisterBehavior>) -> Result<Json<Value>, ServerError> {
    state.preferences.validate_uri(&body.uri)?;
    state.preferences.add_custom_behavior(flowgate_settings::RegistryEntry { uri: body.uri, name: body.name, description: body.description })?;
    Ok(Json(json!({ "ok": true })))
}

async fn remove_behavior(_auth: RequireAuth, State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ServerError> {
    state.preferences.remove_custom_behavior(&name)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ValidateUri {
    uri: String,
}

async fn validate_behavior(_auth: RequireAuth, State(state): State<AppState>, Json(body): Json<ValidateUri>) -> Result<Json<Value>, ServerError> {
    state.preferences.validate_uri(&body.uri)?;
    Ok(Json(json!({ "valid": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router<AppState>, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state_root = dir.path().to_path_buf();
        std::mem::forget(dir);
        let state = crate::test_support::test_app_state(state_root);
        (router().with_state(state.clone()), state)
    }

    #[tokio::test]
    async fn register_then_list_behavior() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let body = serde_json::json!({"uri": "file:///tmp/quiet", "name": "quiet"});
        let req = Request::builder()
            .method("POST")
            .uri("/behaviors/custom")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let list_req = Request::builder().uri("/behaviors").header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap();
        let resp = app.oneshot(list_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn remove_unknown_behavior_is_not_found() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let req = Request::builder()
            .method("DELETE")
            .uri("/behaviors/custom/nonexistent")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validate_rejects_unsupported_scheme() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let body = serde_json::json!({"uri": "ftp://nope"});
        let req = Request::builder()
            .method("POST")
            .uri("/behaviors/validate")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
