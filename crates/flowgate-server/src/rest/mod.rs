//! REST surface: auth bootstrap, bundle/behavior registries, session
//! history, preferences, and document extraction.
//!
//! Every route below requires a bearer token via [`RequireAuth`] except
//! `/auth/local-token`, which instead requires the caller be on loopback —
//! the whole point of that route is letting a same-machine client bootstrap
//! a token without it having one yet.

mod behaviors;
mod bundles;
mod extract;
mod preferences;
mod sessions;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;

use crate::server::AppState;

/// Extractor that rejects the request unless it carries the server's bearer
/// token in an `Authorization: Bearer <token>` header.
pub struct RequireAuth;

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let candidate = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));
        match candidate {
            Some(token) if state.auth.verify(token).unwrap_or(false) => Ok(RequireAuth),
            _ => Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()),
        }
    }
}

/// Mounted at `/api` by [`crate::server::GatewayServer::router`].
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", get(verify_handler))
        .route("/auth/local-token", get(local_token_handler))
        .merge(bundles::router())
        .merge(behaviors::router())
        .merge(sessions::router())
        .merge(preferences::router())
        .merge(extract::router())
}

async fn verify_handler(_auth: RequireAuth) -> Json<serde_json::Value> {
    Json(json!({ "valid": true }))
}

/// Hands the bearer token back to a loopback caller so a same-machine
/// client can bootstrap without copying the token by hand.
async fn local_token_handler(ConnectInfo(peer): ConnectInfo<SocketAddr>, State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    if !crate::auth::is_loopback(peer.ip()) {
        return Err(StatusCode::FORBIDDEN);
    }
    let token = state.auth.token().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "token": token })))
}
