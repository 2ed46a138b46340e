//! # relay-core
//!
//! Foundation types shared by every relay crate.
//!
//! - **IDs**: numeric `RoomId`, `UserId`, `MessageId` and the UUID v7 `ConnectionId`
//! - **Models**: users, rooms, memberships, persisted chat messages
//! - **Wire frames**: inbound client frames and the outbound broadcast envelope
//! - **Collaborators**: the traits the connection core consumes (message gateway,
//!   broadcaster, room access policy, token verifier)
//! - **Errors**: `thiserror` enums for each collaborator contract
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod collaborators;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod models;
pub mod wire;

pub use collaborators::{Broadcaster, Identity, MessageGateway, RoomAccessPolicy, TokenVerifier};
pub use errors::{AccessError, AuthError, GatewayError};
pub use ids::{ConnectionId, MessageId, RoomId, UserId};
pub use models::{ChatMessage, ChatRoom, RoomMembership, User};
pub use wire::{FrameError, InboundFrame, MessageEnvelope, OutboundEnvelope, PONG_FRAME, ServerFrame};
