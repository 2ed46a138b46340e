//! The message gateway and room history.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    Broadcaster, ChatMessage, GatewayError, MessageGateway, OutboundEnvelope, RoomId, UserId,
};
use tracing::{debug, warn};

use crate::errors::{Result, StoreError};
use crate::repo::Repositories;

/// Username shown for history entries whose author no longer exists.
const UNKNOWN_USER: &str = "Unknown User";

/// Content and history bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLimits {
    /// Maximum content length in characters.
    pub max_length: usize,
    /// History page size when the caller does not ask for one.
    pub history_default: usize,
    /// Upper bound on a history page.
    pub history_max: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_length: 1000,
            history_default: 50,
            history_max: 100,
        }
    }
}

/// Validates and persists chat content, then hands it to the broadcaster.
pub struct MessageService {
    repos: Repositories,
    broadcaster: Arc<dyn Broadcaster>,
    limits: MessageLimits,
}

impl MessageService {
    /// Create the service.
    pub fn new(repos: Repositories, broadcaster: Arc<dyn Broadcaster>, limits: MessageLimits) -> Self {
        Self {
            repos,
            broadcaster,
            limits,
        }
    }

    /// Configured bounds.
    pub fn limits(&self) -> MessageLimits {
        self.limits
    }

    /// The latest messages of a room, oldest first.
    ///
    /// `None` or zero selects the default page size; larger requests are
    /// clamped to the maximum.
    pub fn history(&self, room_id: RoomId, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        if self.repos.rooms.find_by_id(room_id).is_none() {
            return Err(StoreError::RoomNotFound(room_id));
        }
        let limit = match limit {
            None | Some(0) => self.limits.history_default,
            Some(n) => n.min(self.limits.history_max),
        };
        let mut messages = self.repos.messages.list_by_room(room_id, limit);
        for message in &mut messages {
            message.username = self
                .repos
                .users
                .find_by_id(message.sender_id)
                .map_or_else(|| UNKNOWN_USER.to_string(), |u| u.username);
        }
        Ok(messages)
    }
}

#[async_trait]
impl MessageGateway for MessageService {
    async fn send(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> std::result::Result<ChatMessage, GatewayError> {
        if content.is_empty() {
            return Err(GatewayError::ContentEmpty);
        }
        if content.chars().count() > self.limits.max_length {
            return Err(GatewayError::ContentTooLong {
                max: self.limits.max_length,
            });
        }
        if self.repos.rooms.find_by_id(room_id).is_none() {
            return Err(GatewayError::RoomNotFound(room_id));
        }
        let sender = self
            .repos
            .users
            .find_by_id(sender_id)
            .ok_or(GatewayError::SenderNotFound(sender_id))?;

        let message = self
            .repos
            .messages
            .save(room_id, sender_id, &sender.username, content);
        debug!(message_id = %message.id, room_id = %room_id, sender_id = %sender_id, "message persisted");

        match OutboundEnvelope::for_message(&message) {
            Ok(envelope) => self.broadcaster.broadcast(envelope).await,
            Err(e) => warn!(message_id = %message.id, error = %e, "failed to encode broadcast envelope"),
        }
        Ok(message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
