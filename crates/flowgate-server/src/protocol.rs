//! Wire-level JSON framing.
//!
//! [`ClientFrame`] deserializes the client → server vocabulary. The
//! server → client direction is built by hand: [`flowgate_streaming::Frame`]
//! carries no `Serialize` impl (framing is this layer's job, not the
//! adapter's), and several lifecycle frames (`session_created`, `auth_success`,
//! `error`, ...) never pass through the adapter at all.

use flowgate_core::{ApprovalId, SessionId};
use flowgate_events::TranscriptEntry;
use flowgate_streaming::{BlockType, Frame};
use serde::Deserialize;
use serde_json::{Value, json};

/// A frame sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Must be the first frame on a new connection.
    Auth { token: String },
    /// Start or resume a session.
    CreateSession {
        #[serde(default)]
        config: CreateSessionConfig,
    },
    /// Start a turn on the connection's (sole, unless targeted) session.
    Prompt {
        #[serde(default)]
        session_id: Option<SessionId>,
        content: String,
        #[serde(default)]
        images: Vec<String>,
        #[serde(default)]
        attachments: Vec<String>,
    },
    /// Resolve a pending approval.
    ApprovalResponse {
        #[serde(default)]
        session_id: Option<SessionId>,
        id: ApprovalId,
        choice: String,
    },
    /// Cancel the current turn, or the whole session if `immediate`.
    Cancel {
        #[serde(default)]
        session_id: Option<SessionId>,
        #[serde(default)]
        immediate: bool,
    },
    /// Invoke a named server command (`status`, `tools`, ...).
    Command {
        #[serde(default)]
        session_id: Option<SessionId>,
        name: String,
        #[serde(default)]
        args: Value,
    },
    /// Keep-alive.
    Ping,
}

/// Body of a `create_session` frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionConfig {
    pub bundle: Option<String>,
    #[serde(default)]
    pub behaviors: Vec<String>,
    pub provider: Option<Value>,
    #[serde(default)]
    pub show_thinking: bool,
    pub initial_transcript: Option<Vec<TranscriptEntry>>,
    pub cwd: Option<String>,
    pub resume_session_id: Option<SessionId>,
}

fn block_type_str(block_type: BlockType) -> &'static str {
    match block_type {
        BlockType::Text => "text",
        BlockType::Thinking => "thinking",
        BlockType::ToolUse => "tool_use",
    }
}

/// Render an adapter-produced [`Frame`] as the JSON object sent over the wire.
#[must_use]
pub fn frame_to_json(session_id: &SessionId, frame: &Frame) -> Value {
    let mut value = match frame {
        Frame::ContentStart { index, order, block_type, child_session_id, parent_tool_call_id, nesting_depth } => json!({
            "type": "content_start",
            "index": index,
            "order": order,
            "blockType": block_type_str(*block_type),
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
            "parentToolCallId": parent_tool_call_id,
            "nestingDepth": nesting_depth,
        }),
        Frame::ContentDelta { index, delta, child_session_id } => json!({
            "type": "content_delta",
            "index": index,
            "delta": delta,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::ContentEnd { index, content, child_session_id } => json!({
            "type": "content_end",
            "index": index,
            "content": content,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::ThinkingDelta { index, order, delta, child_session_id } => json!({
            "type": "thinking_delta",
            "index": index,
            "order": order,
            "delta": delta,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::ThinkingFinal { index, thinking, signature, child_session_id } => json!({
            "type": "thinking_final",
            "index": index,
            "thinking": thinking,
            "signature": signature,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::ToolCall { id, name, arguments, order, status, child_session_id } => json!({
            "type": "tool_call",
            "id": id,
            "name": name,
            "arguments": arguments,
            "order": order,
            "status": status,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::ToolResult { id, success, result, child_session_id } => json!({
            "type": "tool_result",
            "id": id,
            "success": success,
            "result": result,
            "childSessionId": child_session_id.as_ref().map(SessionId::as_str),
        }),
        Frame::SessionFork { child_session_id, parent_tool_call_id } => json!({
            "type": "session_fork",
            "childSessionId": child_session_id.as_str(),
            "parentToolCallId": parent_tool_call_id,
        }),
        Frame::PromptComplete { turn } => json!({
            "type": "prompt_complete",
            "turn": turn,
        }),
    };
    value["sessionId"] = json!(session_id.as_str());
    value
}

/// `auth_success` — sent once the handshake token checks out.
#[must_use]
pub fn auth_success() -> Value {
    json!({ "type": "auth_success" })
}

/// `pong` — reply to a client `ping`.
#[must_use]
pub fn pong() -> Value {
    json!({ "type": "pong" })
}

/// `error` — protocol- or application-level failure that does not close the
/// connection.
#[must_use]
pub fn error_frame(message: impl Into<String>) -> Value {
    json!({ "type": "error", "message": message.into() })
}

/// `session_created` — the session now exists and is mounted.
#[must_use]
pub fn session_created(session_id: &SessionId) -> Value {
    json!({ "type": "session_created", "sessionId": session_id.as_str() })
}

/// `bundle_debug_info` — diagnostic payload from bundle resolution.
#[must_use]
pub fn bundle_debug_info(session_id: &SessionId, debug_info: &Value) -> Value {
    json!({ "type": "bundle_debug_info", "sessionId": session_id.as_str(), "debugInfo": debug_info })
}

/// `approval_request` — built by the [`flowgate_approval::ApprovalSink`]
/// implementation that forwards broker requests to the owning connection.
#[must_use]
pub fn approval_request(session_id: &SessionId, id: &ApprovalId, prompt: &str, options: &[String], timeout_secs: u64, default: &str) -> Value {
    json!({
        "type": "approval_request",
        "sessionId": session_id.as_str(),
        "id": id.as_str(),
        "prompt": prompt,
        "options": options,
        "timeoutSecs": timeout_secs,
        "default": default,
    })
}

/// `display_message` — a collaborator-originated status/log line.
#[must_use]
pub fn display_message(session_id: &SessionId, level: &str, message: &str, source: Option<&str>) -> Value {
    json!({
        "type": "display_message",
        "sessionId": session_id.as_str(),
        "level": level,
        "message": message,
        "source": source,
    })
}

/// `command_result` — response to a client `command` frame.
#[must_use]
pub fn command_result(session_id: Option<&SessionId>, name: &str, result: &Value) -> Value {
    json!({
        "type": "command_result",
        "sessionId": session_id.map(SessionId::as_str),
        "name": name,
        "result": result,
    })
}

/// `session_start` — a session (root or forked) has been mounted and is
/// about to begin producing content.
#[must_use]
pub fn session_start(session_id: &SessionId, bundle: &str, parent_session_id: Option<&SessionId>) -> Value {
    json!({
        "type": "session_start",
        "sessionId": session_id.as_str(),
        "bundle": bundle,
        "parentSessionId": parent_session_id.map(SessionId::as_str),
    })
}

/// `session_end` — a session has stopped producing content, successfully or
/// otherwise.
#[must_use]
pub fn session_end(session_id: &SessionId, status: &str) -> Value {
    json!({
        "type": "session_end",
        "sessionId": session_id.as_str(),
        "status": status,
    })
}

/// `context_compaction` — the runtime compacted the session's context window.
#[must_use]
pub fn context_compaction(session_id: &SessionId, tokens_before: u64, tokens_after: u64, summary: Option<&str>) -> Value {
    json!({
        "type": "context_compaction",
        "sessionId": session_id.as_str(),
        "tokensBefore": tokens_before,
        "tokensAfter": tokens_after,
        "summary": summary,
    })
}

/// `provider_request` — a model provider call is about to be issued.
#[must_use]
pub fn provider_request(session_id: &SessionId, provider: &str, model: &str) -> Value {
    json!({
        "type": "provider_request",
        "sessionId": session_id.as_str(),
        "provider": provider,
        "model": model,
    })
}

/// `provider_response` — a model provider call completed.
#[must_use]
pub fn provider_response(session_id: &SessionId, provider: &str, model: &str, latency_ms: u64, usage: Option<&Value>) -> Value {
    json!({
        "type": "provider_response",
        "sessionId": session_id.as_str(),
        "provider": provider,
        "model": model,
        "latencyMs": latency_ms,
        "usage": usage,
    })
}
