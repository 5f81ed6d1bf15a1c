//! # campus-auth
//!
//! The authentication and authorization core of a student management system.
//!
//! The crate is organized around one credential-store seam and the pieces
//! that consume it:
//!
//! * The [`store`] module defines the [`store::UserStore`] trait (users joined
//!   with roles, plus the per-module permission table) and ships an in-memory
//!   implementation for tests and single-node deployments.
//! * The [`auth`] module provides password hashing, JWT issue/verify, the
//!   login flow, and the actix-web middlewares that protect routes.
//! * The [`accounts`] module provisions the user accounts that back
//!   teacher/student/parent profiles and handles password changes.
//! * The [`web`] module wires everything into an HTTP server.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod web;

/// Log level for the binaries, taken from the `LOG_LEVEL` environment
/// variable. Unset or unrecognized values fall back to `Warn`.
pub fn log_level_from_env() -> simplelog::LevelFilter {
    parse_log_level(std::env::var("LOG_LEVEL").ok().as_deref())
}

fn parse_log_level(raw: Option<&str>) -> simplelog::LevelFilter {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or(simplelog::LevelFilter::Warn)
}
