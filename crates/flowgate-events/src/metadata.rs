//! Session metadata: the `metadata.json` sidecar for each session directory.

use flowgate_core::SessionId;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session, as recorded on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Idle,
    Ended,
    Errored,
}

impl SessionStatus {
    /// Whether a session in this status may be deleted or renamed.
    #[must_use]
    pub const fn is_mutable(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Persisted session metadata. One record per session directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub bundle: String,
    #[serde(default)]
    pub behaviors: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub turn_count: u64,
    pub created_at: String,
    pub updated_at: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub parent_session_id: Option<SessionId>,
}

impl SessionRecord {
    /// Build a fresh record for a newly created session.
    #[must_use]
    pub fn new(session_id: SessionId, bundle: String, behaviors: Vec<String>, cwd: Option<String>) -> Self {
        let now = flowgate_core::time::now_rfc3339();
        Self {
            session_id,
            bundle,
            behaviors,
            name: None,
            turn_count: 0,
            created_at: now.clone(),
            updated_at: now,
            status: SessionStatus::Active,
            cwd,
            parent_session_id: None,
        }
    }
}
