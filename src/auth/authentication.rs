//! The login flow.
//!
//! [`Authenticator::login`] validates an identifier/password pair against the
//! credential store and, on success, returns a signed token plus a sanitized
//! view of the user. Failure responses are deliberately flat: a missing user
//! and a wrong password both come back as [`AuthError::InvalidCredentials`],
//! and a store miss still pays for one bcrypt comparison so response timing
//! does not reveal whether the identifier exists.

use std::sync::Arc;

use lazy_static::lazy_static;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::auth::token::TokenManager;
use crate::error::AuthError;
use crate::store::{ProfileRef, UserRecord, UserStatus, UserStore};

lazy_static! {
    // Compared against when the identifier matches nothing, so a miss costs
    // the same bcrypt round as a wrong password.
    static ref MISS_HASH: String = bcrypt::hash("login-timing-equalizer", bcrypt::DEFAULT_COST)
        .expect("bcrypt hash of a static string");
}

/// Login request body: the identifier may be a username, an email, or a
/// display name — the store tries them in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// The user view that leaves the process. Built from a [`UserRecord`] and
/// structurally incapable of carrying the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRef>,
}

impl From<&UserRecord> for SanitizedUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role.clone(),
            status: user.status,
            profile: user.profile,
        }
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: SanitizedUser,
}

/// Validates credentials and issues tokens.
pub struct Authenticator {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenManager>) -> Self {
        Self { store, tokens }
    }

    /// Runs the full login sequence.
    ///
    /// Order matters: the status and setup checks run only for accounts that
    /// exist, and the bcrypt comparison is always the last gate before a
    /// token is issued.
    pub fn login(&self, identifier: &str, plain: &str) -> Result<LoginResponse, AuthError> {
        let user = match self.store.find_by_identifier(identifier)? {
            Some(user) => user,
            None => {
                let _ = password::verify_password(plain, &MISS_HASH);
                warn!("login rejected: unknown identifier");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if user.status != UserStatus::Active {
            warn!("login rejected for user {}: account inactive", user.id);
            return Err(AuthError::AccountInactive);
        }

        let hash = match user.password_hash.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => {
                warn!("login rejected for user {}: no password set", user.id);
                return Err(AuthError::AccountSetupIncomplete);
            }
        };

        if !password::verify_password(plain, hash)? {
            warn!("login rejected for user {}: password mismatch", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id, &user.role)?;
        info!("user {} logged in with role {}", user.id, user.role);

        Ok(LoginResponse {
            success: true,
            token,
            user: SanitizedUser::from(&user),
        })
    }
}
