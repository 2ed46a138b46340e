use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use relay_core::{User, UserId};

use crate::errors::{Result, StoreError};

#[derive(Default)]
struct UserTable {
    seq: u64,
    by_id: HashMap<UserId, User>,
    by_name: HashMap<String, UserId>,
}

/// Registered users, unique by username.
#[derive(Default)]
pub struct UserRepo {
    table: RwLock<UserTable>,
}

impl UserRepo {
    /// Insert a new user.
    pub fn create(&self, username: &str, password_hash: String) -> Result<User> {
        let mut table = self.table.write();
        if table.by_name.contains_key(username) {
            return Err(StoreError::UsernameTaken);
        }
        table.seq += 1;
        let user = User {
            id: UserId::new(table.seq),
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let _ = table.by_name.insert(user.username.clone(), user.id);
        let _ = table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    /// Look up a user by ID.
    pub fn find_by_id(&self, id: UserId) -> Option<User> {
        self.table.read().by_id.get(&id).cloned()
    }

    /// Look up a user by username.
    pub fn find_by_username(&self, username: &str) -> Option<User> {
        let table = self.table.read();
        table
            .by_name
            .get(username)
            .and_then(|id| table.by_id.get(id))
            .cloned()
    }
}
