//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or parsing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid (e.g., out of range).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// A registry URI did not use a recognized scheme.
    #[error("unsupported registry URI scheme: {0}")]
    UnsupportedScheme(String),
    /// A registry URI was malformed for its scheme.
    #[error("malformed registry URI: {0}")]
    InvalidUri(String),
    /// A `file://` URI resolved outside the home directory and allow-listed roots.
    #[error("path escapes allowed roots: {}", .0.display())]
    PathEscapesAllowedRoots(std::path::PathBuf),
    /// A `file://` URI resolved under a denied system prefix.
    #[error("path under denied prefix: {}", .0.display())]
    DeniedPath(std::path::PathBuf),
    /// No custom bundle or behavior with that name is registered.
    #[error("no registry entry named {0:?}")]
    NotFound(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
