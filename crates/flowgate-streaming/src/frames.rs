//! Client-facing frame vocabulary emitted by the streaming adapter.
//!
//! These are the block/tool-scoped frames from the server→client set; the
//! remaining session-lifecycle and protocol frames (`session_created`,
//! `auth_success`, `error`, ...) are assembled by the WebSocket layer, which
//! wraps these.

use flowgate_core::SessionId;
use serde_json::Value;

pub use crate::events::BlockType;

/// A frame produced by the adapter for one runtime event. `index` is the
/// adapter-assigned `local_index`; `order` is populated on the event that
/// first allocates the block/tool-call slot, and omitted (the client already
/// has it) on subsequent frames about the same slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    ContentStart {
        index: u32,
        order: u64,
        block_type: BlockType,
        child_session_id: Option<SessionId>,
        parent_tool_call_id: Option<String>,
        nesting_depth: u32,
    },
    ContentDelta { index: u32, delta: String, child_session_id: Option<SessionId> },
    ContentEnd { index: u32, content: String, child_session_id: Option<SessionId> },
    ThinkingDelta { index: u32, order: Option<u64>, delta: String, child_session_id: Option<SessionId> },
    ThinkingFinal {
        index: u32,
        thinking: String,
        signature: Option<String>,
        child_session_id: Option<SessionId>,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
        order: u64,
        status: &'static str,
        child_session_id: Option<SessionId>,
    },
    ToolResult { id: String, success: bool, result: Value, child_session_id: Option<SessionId> },
    SessionFork { child_session_id: SessionId, parent_tool_call_id: Option<String> },
    PromptComplete { turn: u64 },
}
