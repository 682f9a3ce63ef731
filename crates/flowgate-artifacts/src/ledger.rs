//! Tool-event observer that derives a file-change timeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use flowgate_core::SessionId;
use parking_lot::Mutex;
use serde_json::Value;
use similar::TextDiff;
use tracing::warn;

use crate::types::{ArtifactEntry, ArtifactOperation};

/// Above this combined byte size of before/after content, diffing is skipped
/// and only the operation and path are recorded.
const DIFF_SIZE_CAP: usize = 512 * 1024;

/// Observes `tool_result` events and builds a per-session artifact timeline.
///
/// Entries are in-memory only; the gateway persists them via the transcript
/// store alongside the owning turn if it chooses to.
pub struct ArtifactLedger {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Vec<ArtifactEntry>>>,
}

impl ArtifactLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), sessions: Mutex::new(HashMap::new()) }
    }

    /// Observe a completed tool call. Returns the recorded entry if the tool
    /// was file-mutating, or `None` if it was not (e.g. a read-only tool).
    ///
    /// Never fails: a diff that cannot be computed degrades to recording the
    /// operation and path alone.
    pub fn observe_tool_result(
        &self,
        session_id: &SessionId,
        tool_name: &str,
        arguments: &Value,
        result: &Value,
    ) -> Option<ArtifactEntry> {
        let operation = ArtifactOperation::from_tool_name(tool_name)?;
        let path = extract_path(arguments, result).unwrap_or_else(|| "<unknown>".to_owned());
        let before = extract_field(arguments, &["old_content", "before"])
            .or_else(|| extract_field(result, &["before"]));
        let after = extract_field(arguments, &["content", "new_content"])
            .or_else(|| extract_field(result, &["after", "content"]));

        let diff = match (&before, &after) {
            (Some(b), Some(a)) if b.len() + a.len() <= DIFF_SIZE_CAP => Some(unified_diff(&path, b, a)),
            (Some(b), Some(a)) => {
                warn!(%session_id, path, size = b.len() + a.len(), "artifact diff skipped: over size cap");
                None
            }
            _ => None,
        };

        let entry = ArtifactEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            session_id: session_id.clone(),
            path,
            operation,
            before,
            after,
            diff,
            timestamp: flowgate_core::time::now_rfc3339(),
        };

        self.sessions.lock().entry(session_id.clone()).or_default().push(entry.clone());
        Some(entry)
    }

    /// List a session's artifacts in insertion order.
    #[must_use]
    pub fn list(&self, session_id: &SessionId) -> Vec<ArtifactEntry> {
        self.sessions.lock().get(session_id).cloned().unwrap_or_default()
    }

    /// Drop a session's artifact history.
    pub fn end_session(&self, session_id: &SessionId) {
        let _ = self.sessions.lock().remove(session_id);
    }
}

impl Default for ArtifactLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_path(arguments: &Value, result: &Value) -> Option<String> {
    for key in ["path", "file_path", "filepath"] {
        if let Some(s) = arguments.get(key).and_then(Value::as_str) {
            return Some(s.to_owned());
        }
    }
    result.get("path").and_then(Value::as_str).map(str::to_owned)
}

fn extract_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| value.get(key).and_then(Value::as_str)).map(str::to_owned)
}

fn unified_diff(path: &str, before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string()
}
