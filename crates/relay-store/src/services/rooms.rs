//! Room lifecycle and access decisions.

use async_trait::async_trait;
use relay_core::{AccessError, ChatRoom, RoomAccessPolicy, RoomId, UserId};
use tracing::info;

use crate::errors::{Result, StoreError};
use crate::repo::Repositories;

/// The room created at startup. It can never be deleted.
pub const DEFAULT_ROOM_ID: RoomId = RoomId::new(1);

/// Creator recorded for rooms the server creates itself.
const SYSTEM_USER: UserId = UserId::new(0);

/// Creates, lists, joins, and deletes rooms.
pub struct RoomService {
    repos: Repositories,
}

impl RoomService {
    /// Create the service.
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Create the public default room unless a room with that name exists.
    pub fn ensure_default_room(&self, name: &str) -> Result<ChatRoom> {
        if let Some(room) = self.repos.rooms.find_by_name(name) {
            return Ok(room);
        }
        let room = self.repos.rooms.create(name, false, SYSTEM_USER)?;
        info!(room_id = %room.id, name = %room.name, "default room created");
        Ok(room)
    }

    /// Create a room. The creator of a private room becomes its first member.
    pub fn create_room(&self, name: &str, is_private: bool, creator: UserId) -> Result<ChatRoom> {
        let name = name.trim();
        match name.chars().count() {
            0 => return Err(StoreError::InvalidRoomName("room name cannot be empty")),
            1 => {
                return Err(StoreError::InvalidRoomName(
                    "room name too short (minimum 2 characters)",
                ));
            }
            n if n > 50 => {
                return Err(StoreError::InvalidRoomName(
                    "room name too long (maximum 50 characters)",
                ));
            }
            _ => {}
        }

        let room = self.repos.rooms.create(name, is_private, creator)?;
        if is_private {
            let _ = self.repos.memberships.add(room.id, creator);
        }
        info!(room_id = %room.id, name = %room.name, is_private, creator = %creator, "room created");
        Ok(room)
    }

    /// Look up a room.
    pub fn find(&self, room_id: RoomId) -> Result<ChatRoom> {
        self.repos
            .rooms
            .find_by_id(room_id)
            .ok_or(StoreError::RoomNotFound(room_id))
    }

    /// Public rooms plus the private rooms `user_id` belongs to, ordered by ID.
    pub fn list_accessible(&self, user_id: UserId) -> Vec<ChatRoom> {
        let joined = self.repos.memberships.rooms_of(user_id);
        self.repos
            .rooms
            .list()
            .into_iter()
            .filter(|room| !room.is_private || joined.contains(&room.id))
            .collect()
    }

    /// Join a private room with its invite code.
    pub fn join_by_invite(&self, code: &str, user_id: UserId) -> Result<ChatRoom> {
        let room = self
            .repos
            .rooms
            .find_by_invite_code(code.trim())
            .ok_or(StoreError::InvalidInviteCode)?;
        if !room.is_private {
            return Err(StoreError::NotPrivateRoom);
        }
        let _ = self.repos.memberships.add(room.id, user_id);
        info!(room_id = %room.id, user_id = %user_id, "joined room by invite");
        Ok(room)
    }

    /// Delete a room with its memberships and messages.
    ///
    /// Live connections are not touched here; callers disconnect the room
    /// from the connection registry afterwards.
    pub fn delete_room(&self, room_id: RoomId, user_id: UserId) -> Result<ChatRoom> {
        if room_id == DEFAULT_ROOM_ID {
            return Err(StoreError::DefaultRoomProtected);
        }
        let room = self.find(room_id)?;
        if room.created_by != user_id {
            return Err(StoreError::NotRoomCreator);
        }
        let memberships = self.repos.memberships.remove_room(room_id);
        let messages = self.repos.messages.delete_by_room(room_id);
        let room = self.repos.rooms.delete(room_id)?;
        info!(room_id = %room_id, memberships, messages, "room deleted");
        Ok(room)
    }

    /// Whether `user_id` may enter `room_id`.
    pub fn check_access(&self, room_id: RoomId, user_id: UserId) -> Result<bool> {
        let room = self.find(room_id)?;
        Ok(!room.is_private || self.repos.memberships.is_member(room_id, user_id))
    }
}

#[async_trait]
impl RoomAccessPolicy for RoomService {
    async fn can_access(&self, room_id: RoomId, user_id: UserId) -> std::result::Result<bool, AccessError> {
        self.check_access(room_id, user_id)
            .map_err(|_| AccessError::RoomNotFound(room_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
