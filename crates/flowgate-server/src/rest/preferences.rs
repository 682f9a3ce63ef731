//! `GET/PUT /api/preferences` — the user's default bundle/behaviors and
//! display settings.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use flowgate_settings::Preferences;

use crate::errors::ServerError;
use crate::server::AppState;

use super::RequireAuth;

pub fn router() -> Router<AppState> {
    Router::new().route("/preferences", get(get_preferences).put(put_preferences))
}

async fn get_preferences(_auth: RequireAuth, State(state): State<AppState>) -> Result<Json<Preferences>, ServerError> {
    Ok(Json(state.preferences.get()?))
}

async fn put_preferences(_auth: RequireAuth, State(state): State<AppState>, Json(prefs): Json<Preferences>) -> Result<Json<Preferences>, ServerError> {
    state.preferences.put_whole(&prefs)?;
    Ok(Json(prefs))
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
    async fn get_preferences_returns_defaults() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let req = Request::builder().uri("/preferences").header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: Preferences = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, Preferences::default());
    }

    #[tokio::test]
    async fn put_preferences_then_get_roundtrips() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let mut prefs = Preferences::default();
        prefs.default_bundle = "research".to_string();

        let put_req = Request::builder()
            .method("PUT")
            .uri("/preferences")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&prefs).unwrap()))
            .unwrap();
        let resp = app.clone().oneshot(put_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let get_req = Request::builder().uri("/preferences").header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap();
        let resp = app.oneshot(get_req).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: Preferences = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.default_bundle, "research");
    }
}
