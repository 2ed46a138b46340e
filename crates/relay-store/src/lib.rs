//! # relay-store
//!
//! In-memory persistence and the services built on it.
//!
//! - [`repo`]: users, rooms, memberships, and messages behind `parking_lot` locks
//! - [`MessageService`]: the message gateway; validates, persists, then broadcasts
//! - [`RoomService`]: room lifecycle, invite codes, and the room access policy
//! - [`UserService`]: registration and login issuing bearer tokens

#![deny(unsafe_code)]

pub mod errors;
pub mod repo;
pub mod services;

pub use errors::{Result, StoreError};
pub use repo::Repositories;
pub use services::messages::{MessageLimits, MessageService};
pub use services::rooms::{DEFAULT_ROOM_ID, RoomService};
pub use services::users::{AuthSession, UserService};
