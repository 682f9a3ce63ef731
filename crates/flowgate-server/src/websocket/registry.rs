//! Routes frames and approval requests to the connection that owns a
//! session.
//!
//! The session manager's per-session task and the approval broker both hold
//! only a `session_id` when they have something to deliver; this registry is
//! the lookup from session to the connection that created (or resumed) it.
//! Reads and writes are synchronous (`parking_lot`) so [`FrameSink`] and
//! [`ApprovalSink`] — both synchronous traits — can be implemented directly
//! without a channel hop.

use std::collections::HashMap;
use std::sync::Arc;

use flowgate_approval::ApprovalSink;
use flowgate_artifacts::ArtifactLedger;
use flowgate_core::{ApprovalId, SessionId};
use flowgate_runtime::FrameSink;
use flowgate_streaming::Frame;
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use super::connection::ClientConnection;
use crate::protocol;

/// Tracks every live connection and which connection owns which session.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    session_owner: RwLock<HashMap<SessionId, String>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self.connections.write().insert(connection.id.clone(), connection);
    }

    /// Drop a connection and every session-ownership entry pointing at it.
    /// Returns the sessions that were owned, so the caller can cancel them.
    pub fn remove(&self, connection_id: &str) -> Vec<SessionId> {
        let _ = self.connections.write().remove(connection_id);
        let mut owner = self.session_owner.write();
        let orphaned: Vec<SessionId> = owner.iter().filter(|(_, owner)| *owner == connection_id).map(|(sid, _)| sid.clone()).collect();
        for sid in &orphaned {
            let _ = owner.remove(sid);
        }
        orphaned
    }

    /// Record that `connection_id` owns `session_id`.
    pub fn bind_session(&self, connection_id: &str, session_id: SessionId) {
        let _ = self.session_owner.write().insert(session_id, connection_id.to_owned());
    }

    /// Stop tracking a deleted session.
    pub fn unbind_session(&self, session_id: &SessionId) {
        let _ = self.session_owner.write().remove(session_id);
    }

    /// The connection that owns `session_id`, if it is still live.
    #[must_use]
    pub fn connection_for_session(&self, session_id: &SessionId) -> Option<Arc<ClientConnection>> {
        let connection_id = self.session_owner.read().get(session_id)?.clone();
        self.connections.read().get(&connection_id).cloned()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

/// [`FrameSink`] that delivers to the owning connection via the registry.
///
/// Also observes `tool_call`/`tool_result` pairs to feed the artifact
/// ledger, and coalesces `content_delta` frames that cannot be delivered
/// immediately (full outbound queue) instead of dropping them outright.
pub struct RegistryFrameSink {
    registry: Arc<ConnectionRegistry>,
    artifacts: Arc<ArtifactLedger>,
    pending_calls: Mutex<HashMap<String, (String, serde_json::Value)>>,
    pending_deltas: Mutex<HashMap<(SessionId, u32), String>>,
}

impl RegistryFrameSink {
    /// Wrap a registry for use as a session manager's outbound sink.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, artifacts: Arc<ArtifactLedger>) -> Self {
        Self { registry, artifacts, pending_calls: Mutex::new(HashMap::new()), pending_deltas: Mutex::new(HashMap::new()) }
    }

    fn observe_artifacts(&self, session_id: &SessionId, frame: &Frame) {
        match frame {
            Frame::ToolCall { id, name, arguments, .. } => {
                self.pending_calls.lock().insert(id.clone(), (name.clone(), arguments.clone()));
            }
            Frame::ToolResult { id, result, .. } => {
                if let Some((name, arguments)) = self.pending_calls.lock().remove(id) {
                    let _ = self.artifacts.observe_tool_result(session_id, &name, &arguments, result);
                }
            }
            _ => {}
        }
    }

    /// Deliver a `content_delta`, merging it onto any previously-buffered
    /// delta for the same block that a full outbound queue left unsent.
    ///
    /// Ordering caveat: a buffered delta only flushes on the next delta for
    /// the same block, or is carried as-is if that never comes (e.g. the
    /// block ends immediately after). The block's `content_end` frame
    /// carries the full text regardless, so no data is lost — only the
    /// granularity of one intermediate delta.
    fn send_delta(&self, session_id: &SessionId, index: u32, delta: &str, child_session_id: Option<SessionId>) {
        let key = (session_id.clone(), index);
        let merged = match self.pending_deltas.lock().remove(&key) {
            Some(mut buffered) => {
                buffered.push_str(delta);
                buffered
            }
            None => delta.to_owned(),
        };
        let frame = Frame::ContentDelta { index, delta: merged.clone(), child_session_id };
        match self.registry.connection_for_session(session_id) {
            Some(conn) => {
                if !conn.send_json(&protocol::frame_to_json(session_id, &frame)) {
                    self.pending_deltas.lock().insert(key, merged);
                }
            }
            None => warn!(%session_id, "dropped content_delta: no connection owns this session"),
        }
    }
}

impl FrameSink for RegistryFrameSink {
    fn send(&self, session_id: &SessionId, frame: Frame) {
        self.observe_artifacts(session_id, &frame);
        if let Frame::ContentDelta { index, delta, child_session_id } = &frame {
            self.send_delta(session_id, *index, delta, child_session_id.clone());
            return;
        }
        match self.registry.connection_for_session(session_id) {
            Some(conn) => {
                if !conn.send_json(&protocol::frame_to_json(session_id, &frame)) {
                    warn!(%session_id, "dropped frame: outbound queue full or connection gone");
                }
            }
            None => warn!(%session_id, "dropped frame: no connection owns this session"),
        }
    }
}

/// [`ApprovalSink`] that delivers `approval_request` frames to the owning
/// connection via the registry.
pub struct RegistryApprovalSink {
    registry: Arc<ConnectionRegistry>,
}

impl RegistryApprovalSink {
    /// Wrap a registry for use as the approval broker's sink.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

impl ApprovalSink for RegistryApprovalSink {
    fn emit_approval_request(&self, session_id: &SessionId, id: &ApprovalId, prompt: &str, options: &[String], timeout_secs: u64, default: &str) {
        match self.registry.connection_for_session(session_id) {
            Some(conn) => {
                let _ = conn.send_json(&protocol::approval_request(session_id, id, prompt, options, timeout_secs, default));
            }
            None => warn!(%session_id, "dropped approval_request: no connection owns this session"),
        }
    }
}
