//! In-memory credential store.
//!
//! Backs the integration tests and single-node deployments. The four roles
//! (`admin`, `teacher`, `student`, `parent`) are seeded on construction;
//! users and permission rows are added at runtime.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use super::{
    NewUser, ProfileKind, RoleRecord, StoreError, UserRecord, UserStatus, UserStore,
};
use crate::auth::authorization::RolePermission;

#[derive(Debug, Clone)]
struct UserRow {
    id: u64,
    name: String,
    email: String,
    username: String,
    password_hash: Option<String>,
    role_id: u64,
    status: UserStatus,
    profile: Option<super::ProfileRef>,
    created_at: chrono::DateTime<Utc>,
}

struct Inner {
    users: HashMap<u64, UserRow>,
    roles: HashMap<u64, RoleRecord>,
    permissions: HashMap<(u64, String), RolePermission>,
    next_user_id: u64,
}

/// HashMap-backed [`UserStore`] behind a `parking_lot` lock.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

const SEED_ROLES: [(u64, &str, &str); 4] = [
    (1, "admin", "Full administrative access"),
    (2, "teacher", "Teaching staff"),
    (3, "student", "Enrolled student"),
    (4, "parent", "Parent or guardian"),
];

impl MemoryStore {
    pub fn new() -> Self {
        let mut roles = HashMap::new();
        for (id, name, description) in SEED_ROLES {
            roles.insert(
                id,
                RoleRecord {
                    id,
                    name: name.to_string(),
                    description: description.to_string(),
                },
            );
        }
        Self {
            inner: RwLock::new(Inner {
                users: HashMap::new(),
                roles,
                permissions: HashMap::new(),
                next_user_id: 1,
            }),
        }
    }

    fn join_role(inner: &Inner, row: &UserRow) -> UserRecord {
        let role = inner
            .roles
            .get(&row.role_id)
            .map(|r| r.name.clone())
            .unwrap_or_default();
        UserRecord {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone(),
            username: row.username.clone(),
            password_hash: row.password_hash.clone(),
            role_id: row.role_id,
            role,
            status: row.status,
            profile: row.profile,
            created_at: row.created_at,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for MemoryStore {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read();
        // Username, then email, then display name: the fallback order the
        // login flow documents.
        let picks: [fn(&UserRow, &str) -> bool; 3] = [
            |row, ident| row.username == ident,
            |row, ident| row.email == ident,
            |row, ident| row.name == ident,
        ];
        for pick in picks {
            if let Some(row) = inner.users.values().find(|row| pick(row, identifier)) {
                return Ok(Some(Self::join_role(&inner, row)));
            }
        }
        Ok(None)
    }

    fn find_by_id(&self, id: u64) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.users.get(&id).map(|row| Self::join_role(&inner, row)))
    }

    fn role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.roles.values().find(|r| r.name == name).cloned())
    }

    fn permission_for(
        &self,
        role_id: u64,
        module: &str,
    ) -> Result<Option<RolePermission>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .permissions
            .get(&(role_id, module.to_string()))
            .cloned())
    }

    fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write();
        if inner.users.values().any(|row| row.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }
        if inner.users.values().any(|row| row.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }

        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let row = UserRow {
            id,
            name: user.name,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role_id: user.role_id,
            status: user.status,
            profile: user.profile,
            created_at: Utc::now(),
        };
        let record = Self::join_role(&inner, &row);
        inner.users.insert(id, row);
        Ok(record)
    }

    fn set_password_hash(&self, id: u64, hash: String) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let row = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.password_hash = Some(hash);
        Ok(())
    }

    fn set_status(&self, id: u64, status: UserStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let row = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.status = status;
        Ok(())
    }

    fn update_contact(
        &self,
        id: u64,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write();
        if let Some(ref email) = email {
            if inner
                .users
                .values()
                .any(|row| row.id != id && &row.email == email)
            {
                return Err(StoreError::Conflict("email"));
            }
        }
        let row = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = name {
            row.name = name;
        }
        if let Some(email) = email {
            row.email = email;
        }
        let row = row.clone();
        Ok(Self::join_role(&inner, &row))
    }

    fn delete_by_profile(&self, kind: ProfileKind, profile_id: u64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let target = inner.users.iter().find_map(|(id, row)| {
            row.profile
                .filter(|p| p.kind == kind && p.id == profile_id)
                .map(|_| *id)
        });
        match target {
            Some(id) => {
                inner.users.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn grant_permission(&self, permission: RolePermission) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.permissions.insert(
            (permission.role_id, permission.module.clone()),
            permission,
        );
        Ok(())
    }
}
