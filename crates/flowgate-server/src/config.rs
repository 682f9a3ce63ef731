//! Server configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the gateway server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Close a connection after this many seconds without any client frame.
    pub read_idle_timeout_secs: u64,
    /// Capacity of a connection's bounded outbound queue before coalescing
    /// kicks in.
    pub outbound_queue_capacity: usize,
    /// Hard cap on the outbound queue; exceeding it even after coalescing
    /// closes the connection as a slow consumer.
    pub outbound_queue_hard_cap: usize,
    /// Directory holding `web-auth.json`, `web-preferences.json`, and
    /// `web-sessions/`.
    pub state_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 50,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            read_idle_timeout_secs: 90,
            outbound_queue_capacity: 256,
            outbound_queue_hard_cap: 2048,
            state_root: PathBuf::from("."),
        }
    }
}
