//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the armada server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat check interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a silent connection after this many seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 64,
            heartbeat_interval_secs: 15,
            heartbeat_timeout_secs: 45,
            max_message_size: 256 * 1024, // 256 KB — object patches are small
        }
    }
}
