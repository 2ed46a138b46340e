//! # relay-server
//!
//! Axum HTTP + `WebSocket` server for the room relay.
//!
//! - [`websocket::hub`]: the connection registry; one coordinator task owns
//!   the room → connection map and applies register, unregister, broadcast,
//!   and room disconnects in order
//! - [`websocket::inbound`] / [`websocket::outbound`]: the two per-connection
//!   pumps joined by a bounded queue
//! - [`api`]: REST endpoints and the authenticated `/ws` upgrade
//! - Prometheus metrics, `/health`, and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod app;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use app::build;
pub use config::ServerConfig;
pub use server::{AppState, RelayServer};
pub use shutdown::{ShutdownCoordinator, TrackedTask};
pub use websocket::hub::Hub;
