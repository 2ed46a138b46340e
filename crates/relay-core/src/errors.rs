//! Error types for the collaborator contracts.

use thiserror::Error;

use crate::ids::{RoomId, UserId};

/// Why the message gateway refused to persist a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The content was empty.
    #[error("empty content")]
    ContentEmpty,
    /// The content exceeded the configured maximum length.
    #[error("message too long (max {max} characters)")]
    ContentTooLong {
        /// Maximum allowed length in characters.
        max: usize,
    },
    /// The target room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    /// The sender does not exist.
    #[error("sender {0} not found")]
    SenderNotFound(UserId),
    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ContentEmpty => "content_empty",
            Self::ContentTooLong { .. } => "content_too_long",
            Self::RoomNotFound(_) => "room_not_found",
            Self::SenderNotFound(_) => "sender_not_found",
            Self::Storage(_) => "storage",
        }
    }
}

/// Failure to decide room access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
}

/// Failure to verify a bearer token or to handle a credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token was supplied.
    #[error("token is empty")]
    MissingToken,
    /// The token has expired.
    #[error("token expired")]
    Expired,
    /// The token failed signature or claim validation.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// A token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
    /// A password could not be hashed.
    #[error("failed to hash password: {0}")]
    Hashing(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
