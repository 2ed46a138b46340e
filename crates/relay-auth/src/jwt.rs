//! HS256 bearer tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use relay_core::{AuthError, Identity, TokenVerifier, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `sub` claim written into every token.
const SUBJECT: &str = "user-auth";

/// Token claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub uid: u64,
    /// Username.
    pub uname: String,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Issuer.
    pub iss: String,
    /// Subject, always `user-auth`.
    pub sub: String,
}

/// Issues and verifies HS256 tokens with a shared secret.
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: i64,
}

impl JwtAuth {
    /// Create a signer/verifier. Tokens live for `ttl_hours`.
    pub fn new(secret: &str, ttl_hours: u64, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.sub = Some(SUBJECT.to_string());

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            ttl_secs: i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user_id` valid from now.
    pub fn issue(&self, user_id: UserId, username: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            uid: user_id.get(),
            uname: username.to_string(),
            exp: iat.saturating_add(self.ttl_secs),
            iat,
            iss: self.issuer.clone(),
            sub: SUBJECT.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Decode and validate a token, returning its claims.
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::Invalid(e.to_string()),
                }
            })
    }
}

impl TokenVerifier for JwtAuth {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.decode_claims(token)?;
        Ok(Identity {
            user_id: UserId::new(claims.uid),
            username: claims.uname,
        })
    }
}

/// Accept both `Bearer <token>` and a bare token.
fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token
        .strip_prefix("Bearer ")
        .or_else(|| token.strip_prefix("bearer "))
        .unwrap_or(token)
        .trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
