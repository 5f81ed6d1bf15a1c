//! Permission model shared by the two route authorizers.
//!
//! Routes are gated either by a fixed role allow-list or by a per-role,
//! per-module capability row with four independent CRUD booleans. Action
//! strings coming from configuration parse into [`Action`]; anything
//! unrecognized is an error, so an unknown action can never grant access.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A CRUD action bound to a route at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("unknown action {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    // Fail closed: an unrecognized action string never maps to a permission.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// One capability row: what a role may do within a module (a route group such
/// as `"students"`). Absence of a row means no permission at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: u64,
    pub module: String,
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl RolePermission {
    /// Grants every action — the usual row for `admin`.
    pub fn full(role_id: u64, module: impl Into<String>) -> Self {
        Self {
            role_id,
            module: module.into(),
            can_create: true,
            can_read: true,
            can_update: true,
            can_delete: true,
        }
    }

    /// Grants only `read`.
    pub fn read_only(role_id: u64, module: impl Into<String>) -> Self {
        Self {
            role_id,
            module: module.into(),
            can_create: false,
            can_read: true,
            can_update: false,
            can_delete: false,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.can_create,
            Action::Read => self.can_read,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }
}

/// Role allow-list check used by the coarse authorizer.
pub fn role_allowed(role: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|candidate| candidate == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_strings_parse_and_fail_closed() {
        assert_eq!("create".parse::<Action>().unwrap(), Action::Create);
        assert_eq!("delete".parse::<Action>().unwrap(), Action::Delete);
        assert!("CREATE".parse::<Action>().is_err());
        assert!("write".parse::<Action>().is_err());
        assert!("".parse::<Action>().is_err());
    }

    #[test]
    fn permission_booleans_map_to_actions() {
        let perm = RolePermission {
            role_id: 2,
            module: "students".to_string(),
            can_create: false,
            can_read: true,
            can_update: true,
            can_delete: false,
        };
        assert!(!perm.allows(Action::Create));
        assert!(perm.allows(Action::Read));
        assert!(perm.allows(Action::Update));
        assert!(!perm.allows(Action::Delete));
    }

    #[test]
    fn constructors_cover_the_common_rows() {
        let full = RolePermission::full(1, "students");
        let read = RolePermission::read_only(2, "students");
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(full.allows(action));
            assert_eq!(read.allows(action), action == Action::Read);
        }
    }

    #[test]
    fn allow_list_matches_exact_role_names() {
        let allowed = vec!["admin".to_string(), "teacher".to_string()];
        assert!(role_allowed("admin", &allowed));
        assert!(role_allowed("teacher", &allowed));
        assert!(!role_allowed("student", &allowed));
        assert!(!role_allowed("Admin", &allowed));
    }
}
