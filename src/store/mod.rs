//! Credential store seam.
//!
//! The [`UserStore`] trait is the single point where the auth flow touches
//! persisted users, roles, and the per-module permission table. The login
//! flow, the protect middleware, and the permission authorizer all go through
//! it, so swapping the in-memory [`MemoryStore`] for a SQL-backed
//! implementation changes nothing above this line. Implementations own their
//! connection handling; callers never open or close anything per request.

pub mod memory;

pub use memory::MemoryStore;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::authorization::RolePermission;

/// Account status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// Which profile entity a user account backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Student,
    Teacher,
    Parent,
}

impl ProfileKind {
    /// Name of the role granted to accounts backing this profile kind.
    pub fn role_name(self) -> &'static str {
        match self {
            ProfileKind::Student => "student",
            ProfileKind::Teacher => "teacher",
            ProfileKind::Parent => "parent",
        }
    }

    pub fn as_str(self) -> &'static str {
        self.role_name()
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(ProfileKind::Student),
            "teacher" => Ok(ProfileKind::Teacher),
            "parent" => Ok(ProfileKind::Parent),
            other => Err(format!("{:?} is not a profile kind", other)),
        }
    }
}

/// Weak back-reference from a user account to its owning profile entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub kind: ProfileKind,
    pub id: u64,
}

/// A user row joined with its role name.
///
/// Deliberately not `Serialize`: the password hash must never reach a wire
/// format. Responses go through `SanitizedUser` instead.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub username: String,
    /// `None` (or empty) until the account finishes setup.
    pub password_hash: Option<String>,
    pub role_id: u64,
    pub role: String,
    pub status: UserStatus,
    pub profile: Option<ProfileRef>,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub role_id: u64,
    pub status: UserStatus,
    pub profile: Option<ProfileRef>,
}

/// Static reference data: a named role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0} is already taken")]
    Conflict(&'static str),

    #[error("user not found")]
    NotFound,
}

/// The credential store contract.
///
/// Reads re-resolve identity on every call — nothing is cached, so a status
/// flip takes effect on the next request.
///
/// The contract is synchronous and is called from async middleware, so
/// implementations must return quickly: in-process lookups, or pooled
/// queries cheap enough not to stall a worker. A backend that performs
/// slow blocking I/O needs to hand that work to `actix_web::web::block`
/// (or an equivalent off-runtime executor) inside its implementation.
pub trait UserStore: Send + Sync {
    /// Looks up a user by username, then email, then display name, in that
    /// order.
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Looks up a user by id, joined with its role.
    fn find_by_id(&self, id: u64) -> Result<Option<UserRecord>, StoreError>;

    fn role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError>;

    /// Fetches the permission row for a (role, module) pair. `None` means no
    /// permission has been configured for that module.
    fn permission_for(&self, role_id: u64, module: &str)
    -> Result<Option<RolePermission>, StoreError>;

    fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Replaces the stored password hash. The only write path that touches
    /// the hash besides [`UserStore::insert_user`].
    fn set_password_hash(&self, id: u64, hash: String) -> Result<(), StoreError>;

    fn set_status(&self, id: u64, status: UserStatus) -> Result<(), StoreError>;

    /// Updates name and/or email. Must leave the password hash untouched.
    fn update_contact(
        &self,
        id: u64,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<UserRecord, StoreError>;

    /// Deletes the user backing the given profile entity. Returns whether a
    /// row was removed.
    fn delete_by_profile(&self, kind: ProfileKind, profile_id: u64) -> Result<bool, StoreError>;

    /// Inserts or replaces a (role, module) permission row.
    fn grant_permission(&self, permission: RolePermission) -> Result<(), StoreError>;
}
