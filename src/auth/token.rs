//! JWT issue and verification.
//!
//! Tokens are the only session mechanism: they carry the user id and role
//! name, expire after a configured lifetime, and are never stored server
//! side. Invalidation is by expiry alone — there is no revocation list, which
//! is why the protect middleware re-resolves the user on every request.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims embedded in every issued token.
///
/// # Fields
/// * `sub`: the user id, as a string.
/// * `role`: the user's role name at issue time.
/// * `iat` / `exp`: issue and expiry timestamps (Unix seconds).
/// * `iss`: the configured issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

/// Signs and verifies tokens with a shared HS256 secret.
///
/// Constructed once at startup from configuration and shared behind an `Arc`;
/// the signing key never lives in a module-level singleton.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    issuer: String,
}

impl TokenManager {
    pub fn new(secret: &[u8], ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            issuer: issuer.into(),
        }
    }

    /// Issues a signed token for the given user id and role, expiring after
    /// the configured lifetime.
    pub fn issue(&self, user_id: u64, role: &str) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Server(format!("system clock error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Server(format!("token signing failed: {}", e)))
    }

    /// Verifies signature, expiry, and issuer and returns the claims.
    ///
    /// Expiry is checked with zero leeway so a token is rejected the moment
    /// it lapses. The error is returned as-is for logging; callers map every
    /// failure to the same generic unauthenticated response.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}
