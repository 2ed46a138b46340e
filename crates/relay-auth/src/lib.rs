//! # relay-auth
//!
//! Credential handling for the room relay.
//!
//! - [`JwtAuth`]: issues HS256 tokens carrying `uid`/`uname` claims and
//!   implements [`relay_core::TokenVerifier`]
//! - [`password`]: Argon2id password hashing

#![deny(unsafe_code)]

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtAuth};
pub use password::{PasswordConfig, PasswordHasher};
