//! Store and service error types.

use relay_core::{AuthError, RoomId};
use thiserror::Error;

/// Errors raised by repositories and services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Username length outside 3..=20 characters.
    #[error("username must be between 3 and 20 characters")]
    InvalidUsername,
    /// Password length outside 6..=100 characters.
    #[error("password must be between 6 and 100 characters")]
    InvalidPassword,
    /// Username already registered.
    #[error("username already exists")]
    UsernameTaken,
    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Room name empty or outside 2..=50 characters.
    #[error("{0}")]
    InvalidRoomName(&'static str),
    /// Room name already used.
    #[error("room name already exists")]
    RoomNameTaken,
    /// No room with this ID.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    /// No room with this invite code.
    #[error("invalid invite code")]
    InvalidInviteCode,
    /// Invite codes only apply to private rooms.
    #[error("invite codes are only for private rooms")]
    NotPrivateRoom,
    /// The default room cannot be deleted.
    #[error("cannot delete the default room")]
    DefaultRoomProtected,
    /// Only the creator may delete a room.
    #[error("only room creator can delete the room")]
    NotRoomCreator,
    /// The user is not allowed into this room.
    #[error("you don't have access to room {0}")]
    AccessDenied(RoomId),
    /// Token handling failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_error_displays_reason() {
        let err = StoreError::InvalidRoomName("room name too short (minimum 2 characters)");
        assert_eq!(err.to_string(), "room name too short (minimum 2 characters)");
    }

    #[test]
    fn auth_error_is_transparent() {
        let err: StoreError = AuthError::Expired.into();
        assert_eq!(err.to_string(), "token expired");
    }
}
