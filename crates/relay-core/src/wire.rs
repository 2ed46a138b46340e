//! JSON text frames exchanged over a room connection.
//!
//! Client → server frames are deliberately loose: a `type` of `ping` or
//! `pong` is a control frame, anything else is read as chat content.
//! Server → client frames are tagged by `type`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{RoomId, UserId};
use crate::models::ChatMessage;

/// Serialized `{"type":"pong"}` reply sent for an application-level ping.
pub const PONG_FRAME: &str = r#"{"type":"pong"}"#;

/// A parsed client frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// `{"type":"ping"}`: answer with [`PONG_FRAME`] on the same connection.
    Ping,
    /// `{"type":"pong"}`: liveness only.
    Pong,
    /// `{"content": "..."}`: chat content for the message gateway. May be empty.
    Chat {
        /// Raw message body.
        content: String,
    },
}

/// Why a client frame could not be parsed.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame was not a JSON object of the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl InboundFrame {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Ok(match raw.kind.as_deref() {
            Some("ping") => Self::Ping,
            Some("pong") => Self::Pong,
            _ => Self::Chat {
                content: raw.content.unwrap_or_default(),
            },
        })
    }
}

/// Body of a `{"type":"message", ...}` broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author's username.
    pub username: String,
    /// Message body.
    pub content: String,
    /// Persistence time, milliseconds since the Unix epoch.
    pub ts: i64,
}

impl From<&ChatMessage> for MessageEnvelope {
    fn from(message: &ChatMessage) -> Self {
        Self {
            room_id: message.room_id,
            sender_id: message.sender_id,
            username: message.username.clone(),
            content: message.content.clone(),
            ts: message.created_at.timestamp_millis(),
        }
    }
}

/// Server → client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A chat message fanned out to a room.
    Message(MessageEnvelope),
    /// Reply to an application-level ping.
    Pong,
}

/// A payload ready for fan-out to one room.
///
/// Serialized once; every recipient queue shares the same allocation.
#[derive(Clone, Debug)]
pub struct OutboundEnvelope {
    /// Target room.
    pub room_id: RoomId,
    /// Serialized JSON text.
    pub payload: Arc<String>,
}

impl OutboundEnvelope {
    /// Build the canonical broadcast envelope for a persisted message.
    pub fn for_message(message: &ChatMessage) -> Result<Self, serde_json::Error> {
        let frame = ServerFrame::Message(MessageEnvelope::from(message));
        Ok(Self {
            room_id: message.room_id,
            payload: Arc::new(serde_json::to_string(&frame)?),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
