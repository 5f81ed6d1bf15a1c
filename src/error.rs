//! Error taxonomy for the authentication and authorization flow.
//!
//! Every failure a client can observe maps to one of the [`AuthError`]
//! variants. The split is deliberate: authentication failures stay generic so
//! the response never reveals which check failed, while authorization
//! failures name the missing role or permission to help admins diagnose
//! access problems. Infrastructure failures (store, hashing library) are
//! logged with their detail and surfaced as a bare 500.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the login flow, the protect middleware, and the two
/// authorizers.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Bad identifier/password pair. The same variant covers "no such user"
    /// and "wrong password" so the message cannot distinguish them.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists but its status flag is disabled.
    #[error("Account is inactive")]
    AccountInactive,

    /// The account exists but no password hash has been set yet.
    #[error("Account setup is incomplete")]
    AccountSetupIncomplete,

    /// Missing, invalid, or expired token, or a token whose user has since
    /// been deleted or deactivated. All branches render identically.
    #[error("Not authorized to access this resource")]
    Unauthenticated,

    /// Authenticated but not allowed. The message names the role or
    /// permission that was missing.
    #[error("{0}")]
    Forbidden(String),

    /// A unique field (email, username) is already taken.
    #[error("{0} is already taken")]
    Conflict(&'static str),

    /// Store or hashing-library failure. The payload is internal detail for
    /// the log; the client only ever sees the generic message.
    #[error("Internal server error")]
    Server(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AuthError::Conflict(field),
            other => AuthError::Server(other.to_string()),
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AuthError::Server(detail) = self {
            log::error!("request failed: {}", detail);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::AccountInactive.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Conflict("email").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::Server("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_never_leak_detail() {
        let err = AuthError::Server("connection refused at 10.0.0.5".into());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn invalid_credentials_message_is_fixed() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
    }
}
