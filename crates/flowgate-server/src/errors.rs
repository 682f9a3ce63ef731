//! Server-level error types: unifies failures from every backing crate into
//! one type REST handlers can turn into an HTTP response and the WebSocket
//! layer can turn into an `error` frame.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP/WebSocket layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bearer token missing or did not match.
    #[error("unauthorized")]
    Unauthorized,
    /// `/api/auth/local-token` requested from a non-loopback peer.
    #[error("local token is only issued to loopback clients")]
    NotLoopback,
    /// Session lifecycle failure from the session manager.
    #[error(transparent)]
    Runtime(#[from] flowgate_runtime::RuntimeError),
    /// Preferences/registry failure.
    #[error(transparent)]
    Settings(#[from] flowgate_settings::SettingsError),
    /// Malformed request body.
    #[error("malformed request: {0}")]
    BadRequest(String),
    /// I/O failure reading or writing server state.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::NotLoopback => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Runtime(flowgate_runtime::RuntimeError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Runtime(flowgate_runtime::RuntimeError::SessionBusy(_) | flowgate_runtime::RuntimeError::SessionActive(_)) => {
                StatusCode::CONFLICT
            }
            Self::Runtime(flowgate_runtime::RuntimeError::Transcript(flowgate_events::TranscriptError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Runtime(flowgate_runtime::RuntimeError::Transcript(flowgate_events::TranscriptError::StillActive(_))) => StatusCode::CONFLICT,
            Self::Settings(flowgate_settings::SettingsError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Settings(
                flowgate_settings::SettingsError::UnsupportedScheme(_)
                | flowgate_settings::SettingsError::InvalidUri(_)
                | flowgate_settings::SettingsError::PathEscapesAllowedRoots(_)
                | flowgate_settings::SettingsError::DeniedPath(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
