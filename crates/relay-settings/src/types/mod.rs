//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their compiled default.

mod auth;
mod chat;
mod server;

pub use auth::*;
pub use chat::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "websocket": { "readTimeoutMs": 60000, "pingIntervalMs": 45000 },
///   "messages": { "maxLength": 2000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection transport settings.
    pub websocket: WebSocketSettings,
    /// Connection registry settings.
    pub hub: HubSettings,
    /// Message validation and history settings.
    pub messages: MessageSettings,
    /// Room bootstrap settings.
    pub rooms: RoomSettings,
    /// Token signing settings.
    pub auth: AuthSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RelaySettings {
    /// Repair values that would break the relay, logging each correction.
    pub fn validate(&mut self) {
        let ws_defaults = WebSocketSettings::default();
        let ws = &mut self.websocket;

        if ws.outbound_queue_capacity == 0 {
            warn!(default = ws_defaults.outbound_queue_capacity, "websocket.outboundQueueCapacity must be at least 1");
            ws.outbound_queue_capacity = ws_defaults.outbound_queue_capacity;
        }
        if ws.read_timeout_ms == 0 {
            warn!(default = ws_defaults.read_timeout_ms, "websocket.readTimeoutMs must be positive");
            ws.read_timeout_ms = ws_defaults.read_timeout_ms;
        }
        if ws.ping_interval_ms == 0 || ws.ping_interval_ms >= ws.read_timeout_ms {
            // Keep the ratio of the defaults (4/5 of the read timeout).
            let corrected = (ws.read_timeout_ms / 5 * 4).max(1);
            warn!(
                ping_interval_ms = ws.ping_interval_ms,
                read_timeout_ms = ws.read_timeout_ms,
                corrected,
                "websocket.pingIntervalMs must be shorter than readTimeoutMs"
            );
            ws.ping_interval_ms = corrected;
        }
        if ws.write_timeout_ms == 0 {
            warn!(default = ws_defaults.write_timeout_ms, "websocket.writeTimeoutMs must be positive");
            ws.write_timeout_ms = ws_defaults.write_timeout_ms;
        }
        if ws.max_frame_bytes == 0 {
            warn!(default = ws_defaults.max_frame_bytes, "websocket.maxFrameBytes must be positive");
            ws.max_frame_bytes = ws_defaults.max_frame_bytes;
        }
        if ws.max_transport_message_bytes < ws.max_frame_bytes {
            warn!(
                max_transport_message_bytes = ws.max_transport_message_bytes,
                max_frame_bytes = ws.max_frame_bytes,
                "websocket.maxTransportMessageBytes raised to maxFrameBytes"
            );
            ws.max_transport_message_bytes = ws.max_frame_bytes;
        }

        if self.hub.command_capacity == 0 {
            warn!("hub.commandCapacity must be at least 1");
            self.hub.command_capacity = HubSettings::default().command_capacity;
        }

        let msg_defaults = MessageSettings::default();
        let msgs = &mut self.messages;
        if msgs.max_length == 0 {
            warn!(default = msg_defaults.max_length, "messages.maxLength must be at least 1");
            msgs.max_length = msg_defaults.max_length;
        }
        if msgs.history_default_limit == 0 {
            warn!("messages.historyDefaultLimit must be at least 1");
            msgs.history_default_limit = msg_defaults.history_default_limit;
        }
        if msgs.history_max_limit < msgs.history_default_limit {
            warn!(
                history_max_limit = msgs.history_max_limit,
                history_default_limit = msgs.history_default_limit,
                "messages.historyMaxLimit raised to historyDefaultLimit"
            );
            msgs.history_max_limit = msgs.history_default_limit;
        }

        if self.auth.jwt_expiry_hours == 0 {
            warn!("auth.jwtExpiryHours must be at least 1");
            self.auth.jwt_expiry_hours = AuthSettings::default().jwt_expiry_hours;
        }
        // Argon2 needs at least 8 KiB per lane and one pass.
        if self.auth.password_memory_kib < 8 {
            warn!(
                password_memory_kib = self.auth.password_memory_kib,
                "auth.passwordMemoryKib must be at least 8"
            );
            self.auth.password_memory_kib = AuthSettings::default().password_memory_kib;
        }
        if self.auth.password_iterations == 0 {
            warn!("auth.passwordIterations must be at least 1");
            self.auth.password_iterations = AuthSettings::default().password_iterations;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
