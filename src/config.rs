//! Environment-driven configuration.
//!
//! All knobs are read once at startup and passed down explicitly; there is no
//! module-level singleton. `JWT_SECRET` is mandatory — the server refuses to
//! start without one, and there is deliberately no built-in fallback value.

use std::time::Duration;
use thiserror::Error;

/// Default token lifetime when `JWT_EXPIRE` is unset.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default length of generated one-time passwords.
pub const DEFAULT_GENERATED_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("invalid JWT_EXPIRE value {0:?} (expected e.g. \"1d\", \"12h\", \"30m\", \"90s\")")]
    InvalidExpiry(String),

    #[error("invalid BIND_PORT value {0:?}")]
    InvalidPort(String),

    #[error("invalid GENERATED_PASSWORD_LEN value {0:?}")]
    InvalidPasswordLen(String),
}

/// Runtime configuration for the auth service.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    /// JWT signing key. Required; never defaulted.
    pub jwt_secret: String,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// `iss` claim stamped into every token.
    pub issuer: String,
    /// Length of random passwords for auto-created teacher/student accounts.
    pub generated_password_len: usize,
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// Fails when `JWT_SECRET` is absent or empty, or when any optional
    /// variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => return Err(ConfigError::MissingSecret),
        };

        let token_ttl = match std::env::var("JWT_EXPIRE") {
            Ok(s) => parse_expiry(&s)?,
            Err(_) => DEFAULT_TOKEN_TTL,
        };

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = match std::env::var("BIND_PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidPort(s))?,
            Err(_) => 8080,
        };

        let issuer =
            std::env::var("JWT_ISSUER").unwrap_or_else(|_| "campus-auth".to_string());

        let generated_password_len = match std::env::var("GENERATED_PASSWORD_LEN") {
            Ok(s) => match s.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidPasswordLen(s)),
            },
            Err(_) => DEFAULT_GENERATED_PASSWORD_LEN,
        };

        Ok(Config {
            bind_addr,
            bind_port,
            jwt_secret,
            token_ttl,
            issuer,
            generated_password_len,
        })
    }
}

/// Parses an expiry string such as `"1d"`, `"12h"`, `"30m"`, or `"90s"`.
/// A bare number is taken as seconds.
pub fn parse_expiry(value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidExpiry(value.to_string());

    if value.is_empty() {
        return Err(invalid());
    }

    let (number, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };

    let amount: u64 = number.parse().map_err(|_| invalid())?;
    let seconds = match unit {
        None | Some('s') => amount,
        Some('m') => amount * 60,
        Some('h') => amount * 60 * 60,
        Some('d') => amount * 60 * 60 * 24,
        Some(_) => return Err(invalid()),
    };

    Ok(Duration::from_secs(seconds))
}
