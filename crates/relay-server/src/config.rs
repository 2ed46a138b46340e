//! Server configuration.

use std::time::Duration;

use relay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

use crate::websocket::inbound::InboundLimits;
use crate::websocket::outbound::OutboundTiming;

/// Runtime configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound queue capacity per connection.
    pub outbound_queue_capacity: usize,
    /// Hub command channel capacity.
    pub hub_command_capacity: usize,
    /// Silence tolerated on a connection before it is torn down, in milliseconds.
    pub read_timeout_ms: u64,
    /// Interval between heartbeat pings, in milliseconds.
    pub ping_interval_ms: u64,
    /// Deadline for one socket write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Text frames above this size are dropped.
    pub max_frame_bytes: usize,
    /// Transport messages above this size close the connection.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            outbound_queue_capacity: 256,
            hub_command_capacity: 256,
            read_timeout_ms: 300_000,
            ping_interval_ms: 240_000,
            write_timeout_ms: 30_000,
            max_frame_bytes: 1024 * 1024,
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

impl From<&RelaySettings> for ServerConfig {
    fn from(settings: &RelaySettings) -> Self {
        let ws = &settings.websocket;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            outbound_queue_capacity: ws.outbound_queue_capacity,
            hub_command_capacity: settings.hub.command_capacity,
            read_timeout_ms: ws.read_timeout_ms,
            ping_interval_ms: ws.ping_interval_ms,
            write_timeout_ms: ws.write_timeout_ms,
            max_frame_bytes: ws.max_frame_bytes,
            max_message_size: ws.max_transport_message_bytes,
        }
    }
}

impl ServerConfig {
    /// Read-side limits for each connection.
    pub fn inbound_limits(&self) -> InboundLimits {
        InboundLimits {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// Write-side timing for each connection.
    pub fn outbound_timing(&self) -> OutboundTiming {
        OutboundTiming {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}
