use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use relay_core::{RoomId, RoomMembership, UserId};

/// Private room memberships, keyed by room.
#[derive(Default)]
pub struct MembershipRepo {
    by_room: RwLock<HashMap<RoomId, HashMap<UserId, RoomMembership>>>,
}

impl MembershipRepo {
    /// Add `user_id` to `room_id`. Existing memberships are kept as is.
    pub fn add(&self, room_id: RoomId, user_id: UserId) -> RoomMembership {
        self.by_room
            .write()
            .entry(room_id)
            .or_default()
            .entry(user_id)
            .or_insert_with(|| RoomMembership {
                room_id,
                user_id,
                joined_at: Utc::now(),
            })
            .clone()
    }

    /// Remove one membership. Returns whether it existed.
    pub fn remove(&self, room_id: RoomId, user_id: UserId) -> bool {
        let mut by_room = self.by_room.write();
        let Some(members) = by_room.get_mut(&room_id) else {
            return false;
        };
        let removed = members.remove(&user_id).is_some();
        if members.is_empty() {
            let _ = by_room.remove(&room_id);
        }
        removed
    }

    /// Whether `user_id` is a member of `room_id`.
    pub fn is_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        self.by_room
            .read()
            .get(&room_id)
            .is_some_and(|members| members.contains_key(&user_id))
    }

    /// Members of a room, ordered by user ID.
    pub fn members(&self, room_id: RoomId) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .by_room
            .read()
            .get(&room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Rooms a user belongs to.
    pub fn rooms_of(&self, user_id: UserId) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self
            .by_room
            .read()
            .iter()
            .filter(|(_, members)| members.contains_key(&user_id))
            .map(|(room_id, _)| *room_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop every membership of a room. Returns how many were removed.
    pub fn remove_room(&self, room_id: RoomId) -> usize {
        self.by_room
            .write()
            .remove(&room_id)
            .map_or(0, |members| members.len())
    }
}
