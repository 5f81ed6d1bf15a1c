//! Authentication, authorization, and token management.
//!
//! * The [`password`] module handles bcrypt hashing and generated one-time
//!   passwords.
//! * The [`token`] module issues and verifies the JWTs used as stateless
//!   bearer credentials.
//! * The [`authentication`] module implements the login flow against the
//!   credential store.
//! * The [`authorization`] module defines the permission model shared by the
//!   route authorizers.
//! * The [`middleware`] module plugs all of the above into actix-web.

pub mod authentication;
pub mod authorization;
pub mod middleware;
pub mod password;
pub mod token;
