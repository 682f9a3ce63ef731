//! Session manager error types.

use flowgate_core::SessionId;
use thiserror::Error;

/// Errors raised by the session manager.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No session with that id is active.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A second `prompt` arrived while the session already has a turn executing.
    #[error("session already executing: {0}")]
    SessionBusy(SessionId),

    /// An operation that requires an inactive session (rename/delete) targeted an active one.
    #[error("session is active: {0}")]
    SessionActive(SessionId),

    /// Bundle/behavior resolution via the runtime collaborator failed.
    #[error("failed to resolve bundle {bundle:?}: {message}")]
    BundleResolution {
        /// The bundle name that failed to resolve.
        bundle: String,
        /// Collaborator-provided failure description.
        message: String,
    },

    /// The runtime collaborator faulted while driving a session.
    #[error("runtime fault in session {session_id}: {message}")]
    RuntimeFault {
        /// The session that faulted.
        session_id: SessionId,
        /// Collaborator-provided failure description.
        message: String,
    },

    /// Transcript store failure.
    #[error(transparent)]
    Transcript(#[from] flowgate_events::TranscriptError),

    /// Approval broker failure.
    #[error(transparent)]
    Approval(#[from] flowgate_approval::ApprovalError),
}

/// Result type for session manager operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
