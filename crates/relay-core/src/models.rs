//! Persisted domain records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned ID.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Salted password digest. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// A chat room.
///
/// Public rooms are open to every authenticated user. Private rooms are
/// limited to their members and carry an invite code for joining.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Store-assigned ID.
    pub id: RoomId,
    /// Unique room name.
    pub name: String,
    /// Whether access is limited to members.
    pub is_private: bool,
    /// Invite code (private rooms only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    /// Creator of the room, the only user allowed to delete it.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a private room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMembership {
    /// Room joined.
    pub room_id: RoomId,
    /// Member.
    pub user_id: UserId,
    /// When the membership was created.
    pub joined_at: DateTime<Utc>,
}

/// A persisted chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Store-assigned ID.
    pub id: MessageId,
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Author's username at read time.
    pub username: String,
    /// Message body.
    pub content: String,
    /// Persistence time.
    pub created_at: DateTime<Utc>,
}
