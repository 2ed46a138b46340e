//! Listener, transport, and registry settings.

use serde::{Deserialize, Serialize};

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

/// Per-connection transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Capacity of each connection's outbound queue. A broadcast that finds
    /// the queue full disconnects the connection.
    pub outbound_queue_capacity: usize,
    /// Idle read window before a silent connection is torn down.
    pub read_timeout_ms: u64,
    /// Interval between server heartbeat pings. Must be below `read_timeout_ms`.
    pub ping_interval_ms: u64,
    /// Deadline for a single transport write.
    pub write_timeout_ms: u64,
    /// Largest application frame accepted; bigger frames are dropped.
    pub max_frame_bytes: usize,
    /// Largest message the websocket codec accepts; bigger messages close the connection.
    pub max_transport_message_bytes: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            read_timeout_ms: 300_000,
            ping_interval_ms: 240_000,
            write_timeout_ms: 30_000,
            max_frame_bytes: 1024 * 1024, // 1 MiB
            max_transport_message_bytes: 4 * 1024 * 1024, // 4 MiB
        }
    }
}

/// Connection registry settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Capacity of the registry's command queue.
    pub command_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            command_capacity: 256,
        }
    }
}
