use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use relay_core::{ChatMessage, MessageId, RoomId, UserId};

#[derive(Default)]
struct MessageTable {
    seq: u64,
    by_room: HashMap<RoomId, Vec<ChatMessage>>,
}

/// Persisted messages, kept per room in insertion order.
#[derive(Default)]
pub struct MessageRepo {
    table: RwLock<MessageTable>,
}

impl MessageRepo {
    /// Persist a message, assigning its ID and timestamp.
    pub fn save(&self, room_id: RoomId, sender_id: UserId, username: &str, content: &str) -> ChatMessage {
        let mut table = self.table.write();
        table.seq += 1;
        let message = ChatMessage {
            id: MessageId::new(table.seq),
            room_id,
            sender_id,
            username: username.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        table.by_room.entry(room_id).or_default().push(message.clone());
        message
    }

    /// The most recent `limit` messages of a room, oldest first.
    pub fn list_by_room(&self, room_id: RoomId, limit: usize) -> Vec<ChatMessage> {
        let table = self.table.read();
        let Some(messages) = table.by_room.get(&room_id) else {
            return Vec::new();
        };
        let start = messages.len().saturating_sub(limit);
        messages[start..].to_vec()
    }

    /// Delete every message of a room. Returns how many were removed.
    pub fn delete_by_room(&self, room_id: RoomId) -> usize {
        self.table
            .write()
            .by_room
            .remove(&room_id)
            .map_or(0, |messages| messages.len())
    }
}
