//! Contracts between the connection core and the services around it.
//!
//! The core trusts whatever room, user, and username it is handed. Token
//! verification and room access are decided before a connection exists; the
//! gateway and broadcaster are the only collaborators called while it runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AccessError, AuthError, GatewayError};
use crate::ids::{RoomId, UserId};
use crate::models::ChatMessage;
use crate::wire::OutboundEnvelope;

/// Validates, persists, and publishes chat content.
///
/// Implementations must hand the canonical envelope to a [`Broadcaster`]
/// exactly once, and only after the message has been persisted.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Persist `content` from `sender_id` in `room_id` and return the stored record.
    async fn send(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<ChatMessage, GatewayError>;
}

/// Fans a serialized envelope out to every live connection in its room.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Queue `envelope` for fan-out. Never blocks on individual consumers.
    async fn broadcast(&self, envelope: OutboundEnvelope);
}

/// Decides whether a user may open a connection to a room.
#[async_trait]
pub trait RoomAccessPolicy: Send + Sync {
    /// `Ok(true)` if `user_id` may join `room_id`.
    async fn can_access(&self, room_id: RoomId, user_id: UserId) -> Result<bool, AccessError>;
}

/// Authenticated caller extracted from a bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID from the token.
    pub user_id: UserId,
    /// Username from the token.
    pub username: String,
}

/// Turns a bearer token into an [`Identity`].
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return the identity it carries.
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}
