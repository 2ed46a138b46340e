//! In-memory repositories.
//!
//! Each repository owns one table behind a `parking_lot::RwLock` and hands
//! out clones. IDs are sequential, starting at 1.

mod memberships;
mod messages;
mod rooms;
mod users;

pub use memberships::MembershipRepo;
pub use messages::MessageRepo;
pub use rooms::RoomRepo;
pub use users::UserRepo;

use std::sync::Arc;

/// All repositories, shared between services.
#[derive(Clone, Default)]
pub struct Repositories {
    /// Registered users.
    pub users: Arc<UserRepo>,
    /// Chat rooms.
    pub rooms: Arc<RoomRepo>,
    /// Private room memberships.
    pub memberships: Arc<MembershipRepo>,
    /// Persisted messages.
    pub messages: Arc<MessageRepo>,
}

impl Repositories {
    /// Empty in-memory repositories.
    pub fn new() -> Self {
        Self::default()
    }
}
