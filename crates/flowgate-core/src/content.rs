//! Shared vocabulary for transcript roles, content blocks, and tool-call state.
//!
//! These types mirror the data model in the gateway specification: a
//! transcript entry has a [`Role`] and either a plain string or an ordered
//! list of [`ContentBlock`]s. Tool calls carry a [`ToolStatus`] that only
//! ever moves forward.

use serde::{Deserialize, Serialize};

/// Role of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single block of transcript content.
///
/// `thinking` and `text` blocks stream incrementally (`content_start` /
/// `content_delta` / `content_end`); `tool_use` announces a call and
/// `tool_result` carries its outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String, signature: Option<String> },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Discriminant string used for per-block-type bookkeeping.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
        }
    }
}

/// Tool-call lifecycle state. Transitions are monotonic: once `Complete` or
/// `Error` is reached, no further transition is permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Complete,
    Error,
}

impl ToolStatus {
    /// Whether this status is terminal (`Complete` or `Error`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self -> next` is a legal forward transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ToolStatus::{Complete, Error, Pending, Running};
        match (self, next) {
            (Pending, Running | Complete | Error) => true,
            (Running, Complete | Error) => true,
            _ => false,
        }
    }
}
