//! Approval broker: correlates pending approval requests with client
//! responses, with timeout-default resolution and per-session "always"
//! caching.

use std::collections::HashMap;
use std::time::Duration;

use flowgate_core::{ApprovalId, SessionId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tokio::time;
use tracing::debug;

use crate::errors::{ApprovalError, Result};

/// Stable cache key for a prompt + ordered option list.
///
/// Must never fold in a timestamp or id — the same prompt/options pair
/// always yields the same fingerprint no matter when it is asked.
#[must_use]
pub fn fingerprint(prompt: &str, options: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    for opt in options {
        hasher.update([0u8]);
        hasher.update(opt.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Pushes an `approval_request` frame to whatever transport fronts this
/// broker. Implemented by the WebSocket layer; kept abstract here so the
/// broker is testable without a live connection.
pub trait ApprovalSink: Send + Sync {
    /// Emit an `approval_request` frame for `id`.
    fn emit_approval_request(
        &self,
        session_id: &SessionId,
        id: &ApprovalId,
        prompt: &str,
        options: &[String],
        timeout_secs: u64,
        default: &str,
    );
}

#[derive(Default)]
struct SessionState {
    pending: HashMap<ApprovalId, oneshot::Sender<String>>,
    cache: HashMap<String, String>,
}

/// Correlates pending approvals with client responses.
///
/// One broker instance serves an entire session tree (a sub-session's tool
/// calls route their approvals through the owning root's broker so a single
/// approval UI can serve the whole tree).
pub struct ApprovalBroker {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl ApprovalBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    /// Request approval, returning the chosen option text.
    ///
    /// A cache hit for `(prompt, options)` within this session returns
    /// immediately without emitting a frame. Otherwise mints an id, emits a
    /// request through `sink`, and suspends until `respond` is called or
    /// `timeout` elapses (whichever comes first); a late `respond` after the
    /// timeout has already resolved the waiter is silently dropped.
    ///
    /// # Errors
    /// Returns [`ApprovalError::NoOptions`] if `options` is empty.
    pub async fn request(
        &self,
        sink: &dyn ApprovalSink,
        session_id: &SessionId,
        prompt: &str,
        options: Vec<String>,
        timeout: Duration,
        default: &str,
    ) -> Result<String> {
        if options.is_empty() {
            return Err(ApprovalError::NoOptions);
        }
        let fp = fingerprint(prompt, &options);

        if let Some(cached) = self.cached_choice(session_id, &fp) {
            debug!(%session_id, "approval cache hit, no request frame emitted");
            return Ok(cached);
        }

        let id = ApprovalId::new();
        let (tx, rx) = oneshot::channel();
        {
            let mut sessions = self.sessions.lock();
            sessions.entry(session_id.clone()).or_default().pending.insert(id.clone(), tx);
        }

        sink.emit_approval_request(session_id, &id, prompt, &options, timeout.as_secs(), default);

        let choice = match time::timeout(timeout, rx).await {
            Ok(Ok(choice)) => choice,
            Ok(Err(_) /* sender dropped */) | Err(_ /* elapsed */) => {
                self.take_pending(session_id, &id);
                default.to_owned()
            }
        };

        if choice.to_lowercase().contains("always") {
            let mut sessions = self.sessions.lock();
            sessions.entry(session_id.clone()).or_default().cache.insert(fp, choice.clone());
        }

        Ok(choice)
    }

    /// Resolve a pending approval with the client's chosen option.
    ///
    /// # Errors
    /// Returns [`ApprovalError::NotPending`] if `id` is not pending — either
    /// it never existed, already resolved, or the timeout already fired.
    pub fn respond(&self, session_id: &SessionId, id: &ApprovalId, choice: String) -> Result<()> {
        let tx = self.take_pending(session_id, id).ok_or_else(|| ApprovalError::NotPending(id.clone()))?;
        let _ = tx.send(choice);
        Ok(())
    }

    /// Fire every pending approval in a session with `default`. Used on
    /// session cancellation.
    pub fn cancel_session(&self, session_id: &SessionId, default: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(state) = sessions.get_mut(session_id) {
            for (_, tx) in state.pending.drain() {
                let _ = tx.send(default.to_owned());
            }
        }
    }

    /// Drop a session's pending table and "always" cache entirely.
    pub fn end_session(&self, session_id: &SessionId) {
        let _ = self.sessions.lock().remove(session_id);
    }

    /// Number of approvals currently pending for a session (test/diagnostic use).
    #[must_use]
    pub fn pending_count(&self, session_id: &SessionId) -> usize {
        self.sessions.lock().get(session_id).map_or(0, |s| s.pending.len())
    }

    fn cached_choice(&self, session_id: &SessionId, fingerprint: &str) -> Option<String> {
        self.sessions.lock().get(session_id)?.cache.get(fingerprint).cloned()
    }

    fn take_pending(&self, session_id: &SessionId, id: &ApprovalId) -> Option<oneshot::Sender<String>> {
        self.sessions.lock().get_mut(session_id)?.pending.remove(id)
    }
}

impl Default for ApprovalBroker {
    fn default() -> Self {
        Self::new()
    }
}
