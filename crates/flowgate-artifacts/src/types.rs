//! Artifact ledger data model.

use flowgate_core::SessionId;
use serde::{Deserialize, Serialize};

/// The kind of file-system side effect a tool call produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOperation {
    Create,
    Edit,
    Delete,
    Bash,
}

impl ArtifactOperation {
    /// Classify an operation from a tool name using substring heuristics,
    /// or `None` if the tool is not file-mutating.
    #[must_use]
    pub fn from_tool_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("bash") || lower.contains("shell") || lower.contains("exec") {
            Some(Self::Bash)
        } else if lower.contains("delete") || lower.contains("remove") || lower.contains("rm") {
            Some(Self::Delete)
        } else if lower.contains("edit") || lower.contains("patch") {
            Some(Self::Edit)
        } else if lower.contains("write") || lower.contains("create") {
            Some(Self::Create)
        } else {
            None
        }
    }
}

/// One recorded file-mutating side effect of a completed tool call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub id: u64,
    pub session_id: SessionId,
    pub path: String,
    pub operation: ArtifactOperation,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
    pub timestamp: String,
}
