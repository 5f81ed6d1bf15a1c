//! Account lifecycle behind the auth flow.
//!
//! Profile records (students, teachers, parents) live elsewhere; this module
//! owns the user accounts that back them. Provisioning assigns the role
//! matching the profile kind and an initial password — the fixed parent
//! default, or a generated one returned to the caller exactly once. Password
//! changes rehash; contact updates never touch the hash.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::authentication::SanitizedUser;
use crate::auth::password;
use crate::error::AuthError;
use crate::store::{NewUser, ProfileKind, ProfileRef, UserStatus, UserStore};

/// Input for provisioning an account alongside a newly created profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub profile_id: u64,
    pub name: String,
    pub email: String,
    /// Defaults to the local part of the email when absent.
    #[serde(default)]
    pub username: Option<String>,
}

/// A freshly provisioned account. `password` is the plaintext initial
/// password; it exists only in this response and is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccount {
    pub user: SanitizedUser,
    pub password: String,
}

/// Creates, updates, and removes the user accounts backing profiles.
pub struct AccountService {
    store: Arc<dyn UserStore>,
    generated_password_len: usize,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, generated_password_len: usize) -> Self {
        Self {
            store,
            generated_password_len,
        }
    }

    /// Creates an account for a profile of the given kind.
    ///
    /// Parents get the fixed default password; teachers and students get a
    /// random one. Either way the plaintext is handed back once and only the
    /// hash is stored.
    pub fn provision(
        &self,
        kind: ProfileKind,
        req: ProvisionRequest,
    ) -> Result<ProvisionedAccount, AuthError> {
        let role = self
            .store
            .role_by_name(kind.role_name())?
            .ok_or_else(|| AuthError::Server(format!("role {:?} is not seeded", kind.role_name())))?;

        let plain = match kind {
            ProfileKind::Parent => password::PARENT_DEFAULT_PASSWORD.to_string(),
            _ => password::generate_password(self.generated_password_len),
        };
        let hash = password::hash_password(&plain)?;

        let username = req
            .username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| local_part(&req.email).to_string());

        let user = self.store.insert_user(NewUser {
            name: req.name,
            email: req.email,
            username,
            password_hash: Some(hash),
            role_id: role.id,
            status: UserStatus::Active,
            profile: Some(ProfileRef {
                kind,
                id: req.profile_id,
            }),
        })?;

        info!("provisioned {} account {} for profile {}", kind, user.id, req.profile_id);
        Ok(ProvisionedAccount {
            user: SanitizedUser::from(&user),
            password: plain,
        })
    }

    /// Rehashes and stores a new password for an existing account.
    pub fn change_password(&self, user_id: u64, new_plain: &str) -> Result<(), AuthError> {
        let hash = password::hash_password(new_plain)?;
        self.store.set_password_hash(user_id, hash)?;
        info!("password changed for user {}", user_id);
        Ok(())
    }

    /// Updates contact fields, leaving credentials alone.
    pub fn update_contact(
        &self,
        user_id: u64,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<SanitizedUser, AuthError> {
        let user = self.store.update_contact(user_id, name, email)?;
        Ok(SanitizedUser::from(&user))
    }

    /// Flips the status flag. Takes effect on the next request, issued tokens
    /// included.
    pub fn set_status(&self, user_id: u64, status: UserStatus) -> Result<(), AuthError> {
        self.store.set_status(user_id, status)?;
        info!("user {} status set to {:?}", user_id, status);
        Ok(())
    }

    /// Removes the account backing a deleted profile. Returns whether an
    /// account existed.
    pub fn remove_profile(&self, kind: ProfileKind, profile_id: u64) -> Result<bool, AuthError> {
        let removed = self.store.delete_by_profile(kind, profile_id)?;
        if removed {
            info!("removed {} account for profile {}", kind, profile_id);
        }
        Ok(removed)
    }
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(store.clone(), 8);
        (store, accounts)
    }

    fn request(profile_id: u64, name: &str, email: &str) -> ProvisionRequest {
        ProvisionRequest {
            profile_id,
            name: name.to_string(),
            email: email.to_string(),
            username: None,
        }
    }

    #[test]
    fn parent_accounts_get_the_fixed_default_password() {
        let (store, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Parent, request(9, "Pat Parent", "pat@school.test"))
            .unwrap();

        assert_eq!(account.password, password::PARENT_DEFAULT_PASSWORD);
        assert_eq!(account.user.role, "parent");

        let stored = store.find_by_id(account.user.id).unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, account.password, "only the hash may be stored");
        assert!(password::verify_password(&account.password, &hash).unwrap());
    }

    #[test]
    fn teacher_accounts_get_a_generated_password() {
        let (_, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Teacher, request(3, "Taylor Teach", "taylor@school.test"))
            .unwrap();

        assert_eq!(account.password.chars().count(), 8);
        assert_ne!(account.password, password::PARENT_DEFAULT_PASSWORD);
        assert_eq!(account.user.role, "teacher");
        assert_eq!(account.user.username, "taylor", "username falls back to the email local part");
    }

    #[test]
    fn explicit_username_wins_over_the_email_fallback() {
        let (_, accounts) = service();
        let mut req = request(4, "Sam Student", "sam@school.test");
        req.username = Some("sam_the_student".to_string());
        let account = accounts.provision(ProfileKind::Student, req).unwrap();
        assert_eq!(account.user.username, "sam_the_student");
    }

    #[test]
    fn provisioning_links_account_to_profile() {
        let (store, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Student, request(77, "Sky Student", "sky@school.test"))
            .unwrap();

        let stored = store.find_by_id(account.user.id).unwrap().unwrap();
        let profile = stored.profile.unwrap();
        assert_eq!(profile.kind, ProfileKind::Student);
        assert_eq!(profile.id, 77);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let (_, accounts) = service();
        accounts
            .provision(ProfileKind::Student, request(1, "A", "same@school.test"))
            .unwrap();
        let err = accounts
            .provision(ProfileKind::Student, request(2, "B", "same@school.test"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[test]
    fn change_password_rehashes() {
        let (store, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Teacher, request(1, "T", "t@school.test"))
            .unwrap();
        let old_hash = store
            .find_by_id(account.user.id)
            .unwrap()
            .unwrap()
            .password_hash
            .unwrap();

        accounts.change_password(account.user.id, "brand-new-pw").unwrap();

        let new_hash = store
            .find_by_id(account.user.id)
            .unwrap()
            .unwrap()
            .password_hash
            .unwrap();
        assert_ne!(old_hash, new_hash);
        assert!(password::verify_password("brand-new-pw", &new_hash).unwrap());
        assert!(!password::verify_password(&account.password, &new_hash).unwrap());
    }

    #[test]
    fn contact_update_preserves_the_hash() {
        let (store, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Teacher, request(1, "T", "t@school.test"))
            .unwrap();
        let hash_before = store
            .find_by_id(account.user.id)
            .unwrap()
            .unwrap()
            .password_hash
            .unwrap();

        let updated = accounts
            .update_contact(
                account.user.id,
                Some("T Renamed".to_string()),
                Some("renamed@school.test".to_string()),
            )
            .unwrap();
        assert_eq!(updated.name, "T Renamed");
        assert_eq!(updated.email, "renamed@school.test");

        let hash_after = store
            .find_by_id(account.user.id)
            .unwrap()
            .unwrap()
            .password_hash
            .unwrap();
        assert_eq!(hash_before, hash_after);
        assert!(password::verify_password(&account.password, &hash_after).unwrap());
    }

    #[test]
    fn remove_profile_deletes_the_backing_account() {
        let (store, accounts) = service();
        let account = accounts
            .provision(ProfileKind::Student, request(12, "S", "s@school.test"))
            .unwrap();

        assert!(accounts.remove_profile(ProfileKind::Student, 12).unwrap());
        assert!(store.find_by_id(account.user.id).unwrap().is_none());
        // Second delete is a no-op, not an error.
        assert!(!accounts.remove_profile(ProfileKind::Student, 12).unwrap());
    }
}
