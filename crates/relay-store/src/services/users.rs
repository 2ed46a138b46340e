//! Registration and login.

use std::sync::Arc;

use relay_auth::{JwtAuth, PasswordHasher};
use relay_core::User;
use serde::Serialize;
use tracing::info;

use crate::errors::{Result, StoreError};
use crate::repo::UserRepo;

/// A freshly issued token and the user it belongs to.
#[derive(Clone, Debug, Serialize)]
pub struct AuthSession {
    /// Bearer token.
    pub token: String,
    /// Authenticated user.
    pub user: User,
}

/// Registers users and logs them in.
pub struct UserService {
    users: Arc<UserRepo>,
    auth: Arc<JwtAuth>,
    hasher: PasswordHasher,
}

impl UserService {
    /// Create the service.
    pub fn new(users: Arc<UserRepo>, auth: Arc<JwtAuth>, hasher: PasswordHasher) -> Self {
        Self { users, auth, hasher }
    }

    /// Register a new user and issue a token.
    pub fn register(&self, username: &str, password: &str) -> Result<AuthSession> {
        if !(3..=20).contains(&username.chars().count()) {
            return Err(StoreError::InvalidUsername);
        }
        if !(6..=100).contains(&password.chars().count()) {
            return Err(StoreError::InvalidPassword);
        }
        let password_hash = self.hasher.hash(password)?;
        let user = self.users.create(username, password_hash)?;
        info!(user_id = %user.id, username, "user registered");
        let token = self.auth.issue(user.id, &user.username)?;
        Ok(AuthSession { token, user })
    }

    /// Check credentials and issue a token.
    pub fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        let user = self
            .users
            .find_by_username(username)
            .filter(|u| self.hasher.verify(password, &u.password_hash))
            .ok_or(StoreError::InvalidCredentials)?;
        let token = self.auth.issue(user.id, &user.username)?;
        Ok(AuthSession { token, user })
    }
}
