//! Transcript store error types.

use flowgate_core::SessionId;
use thiserror::Error;

/// Errors that can occur while reading or writing transcript state.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Failed to read or write a transcript or metadata file.
    #[error("transcript I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to (de)serialize a transcript entry or metadata record.
    #[error("transcript JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// No session with this id has ever been opened.
    #[error("session not found: {0}")]
    NotFound(SessionId),
    /// The session directory lock is held by another process.
    #[error("transcript store is locked by another process")]
    Locked,
    /// Attempted to mutate a session that is still active.
    #[error("session {0} is still active")]
    StillActive(SessionId),
}

/// Result type for transcript store operations.
pub type Result<T> = std::result::Result<T, TranscriptError>;
