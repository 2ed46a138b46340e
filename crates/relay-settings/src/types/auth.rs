//! Token signing and password hashing settings.

use serde::{Deserialize, Serialize};

/// Secret used when none is configured. Only suitable for local development.
pub const DEV_JWT_SECRET: &str = "dev-super-secret-change-me";

/// Token signing and password hashing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret for HS256 tokens.
    pub jwt_secret: String,
    /// Token lifetime in hours.
    pub jwt_expiry_hours: u64,
    /// `iss` claim written and required.
    pub issuer: String,
    /// Argon2id memory cost in KiB.
    pub password_memory_kib: u32,
    /// Argon2id iterations.
    pub password_iterations: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24,
            issuer: "relay".to_string(),
            password_memory_kib: 19 * 1024,
            password_iterations: 2,
        }
    }
}

impl AuthSettings {
    /// Whether the development secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
