use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use rand::distr::Alphanumeric;
use relay_core::{ChatRoom, RoomId, UserId};

use crate::errors::{Result, StoreError};

/// Length of generated invite codes.
const INVITE_CODE_LEN: usize = 8;

#[derive(Default)]
struct RoomTable {
    seq: u64,
    rooms: BTreeMap<RoomId, ChatRoom>,
}

/// Chat rooms, unique by name. Private rooms get a unique invite code.
#[derive(Default)]
pub struct RoomRepo {
    table: RwLock<RoomTable>,
}

impl RoomRepo {
    /// Insert a new room.
    pub fn create(&self, name: &str, is_private: bool, created_by: UserId) -> Result<ChatRoom> {
        let mut table = self.table.write();
        if table.rooms.values().any(|r| r.name == name) {
            return Err(StoreError::RoomNameTaken);
        }
        let invite_code = is_private.then(|| {
            let mut code = new_invite_code();
            while table.rooms.values().any(|r| r.invite_code.as_deref() == Some(code.as_str())) {
                code = new_invite_code();
            }
            code
        });
        table.seq += 1;
        let room = ChatRoom {
            id: RoomId::new(table.seq),
            name: name.to_string(),
            is_private,
            invite_code,
            created_by,
            created_at: Utc::now(),
        };
        let _ = table.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    /// All rooms ordered by ID.
    pub fn list(&self) -> Vec<ChatRoom> {
        self.table.read().rooms.values().cloned().collect()
    }

    /// Look up a room by ID.
    pub fn find_by_id(&self, id: RoomId) -> Option<ChatRoom> {
        self.table.read().rooms.get(&id).cloned()
    }

    /// Look up a room by name.
    pub fn find_by_name(&self, name: &str) -> Option<ChatRoom> {
        self.table.read().rooms.values().find(|r| r.name == name).cloned()
    }

    /// Look up a room by invite code.
    pub fn find_by_invite_code(&self, code: &str) -> Option<ChatRoom> {
        self.table
            .read()
            .rooms
            .values()
            .find(|r| r.invite_code.as_deref() == Some(code))
            .cloned()
    }

    /// Remove a room.
    pub fn delete(&self, id: RoomId) -> Result<ChatRoom> {
        self.table
            .write()
            .rooms
            .remove(&id)
            .ok_or(StoreError::RoomNotFound(id))
    }
}

fn new_invite_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}
