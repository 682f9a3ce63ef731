//! Runtime event vocabulary: what the agent runtime pushes into the
//! streaming adapter, per the event sink contract. Framing (index/order
//! assignment) is the adapter's job, not the runtime's.

use flowgate_core::SessionId;
use serde_json::Value;

/// A unit of streamed assistant output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    Text,
    Thinking,
    ToolUse,
}

/// Context shared by every nestable event: which sub-session timeline (if
/// any) it belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Nesting {
    pub child_session_id: Option<SessionId>,
    pub parent_tool_call_id: Option<String>,
    pub nesting_depth: u32,
}

impl Nesting {
    /// The top-level (non-nested) context.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }
}

/// An event pushed by the runtime collaborator's event sink.
#[derive(Clone, Debug)]
pub enum RuntimeEvent {
    ContentStart { server_index: u32, block_type: BlockType, nesting: Nesting },
    ContentDelta { server_index: u32, delta: String, nesting: Nesting },
    ContentEnd { server_index: u32, content: String, nesting: Nesting },
    ThinkingDelta { delta: String, nesting: Nesting },
    ThinkingFinal { thinking: String, signature: Option<String>, nesting: Nesting },
    ToolCall { id: String, name: String, arguments: Value, nesting: Nesting },
    ToolResult { id: String, success: bool, result: Value, nesting: Nesting },
    SessionFork { child_session_id: SessionId, parent_tool_call_id: Option<String> },
    PromptComplete { turn: u64 },
}
