//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the signaling relay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Depth of each peer's outbound send queue.
    pub send_queue_depth: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (close after this many seconds of
    /// missed pongs).
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            send_queue_depth: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            // Signaling frames are small; SDP blobs top out well below this.
            max_message_size: 256 * 1024,
        }
    }
}
