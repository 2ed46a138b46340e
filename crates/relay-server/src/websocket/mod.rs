//! Room connections: registry, per-connection pumps, and session lifecycle.

pub mod connection;
pub mod hub;
pub mod inbound;
pub mod outbound;
pub mod session;
