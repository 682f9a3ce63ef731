//! WebSocket client connection state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use flowgate_core::SessionId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// Represents a connected WebSocket client.
///
/// One connection may own more than one session (rare in practice, but
/// supported): every frame that targets a session carries the session id, so
/// there is no need for a connection to hold a single bound id.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Sessions this connection created or resumed.
    sessions: Mutex<HashSet<SessionId>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    #[must_use]
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            sessions: Mutex::new(HashSet::new()),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Record that this connection owns `session_id`.
    pub fn own_session(&self, session_id: SessionId) {
        let _ = self.sessions.lock().insert(session_id);
    }

    /// Stop tracking a session (on delete, or connection teardown).
    pub fn disown_session(&self, session_id: &SessionId) {
        let _ = self.sessions.lock().remove(session_id);
    }

    /// Whether this connection owns `session_id`.
    #[must_use]
    pub fn owns_session(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().contains(session_id)
    }

    /// Every session currently owned by this connection.
    #[must_use]
    pub fn owned_sessions(&self) -> Vec<SessionId> {
        self.sessions.lock().iter().cloned().collect()
    }

    /// Send a text message to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Serialize a JSON value and send it to the client.
    pub fn send_json(&self, value: &Value) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Connection age.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
