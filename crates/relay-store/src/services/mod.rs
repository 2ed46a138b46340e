//! Services over the in-memory repositories.

pub mod messages;
pub mod rooms;
pub mod users;
