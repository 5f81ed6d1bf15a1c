//! Password hashing and generation.
//!
//! Plaintext passwords are bcrypt-hashed before they reach the store, on
//! creation and on every change; updates that do not touch the password never
//! go through this module, so a hash is never hashed twice. Comparison always
//! goes through [`verify_password`], never string equality, and a bcrypt
//! library error is surfaced as a server error rather than treated as a
//! mismatch.

use bcrypt::DEFAULT_COST;
use rand::Rng;

use crate::error::AuthError;

/// Fixed password assigned to auto-created parent accounts.
pub const PARENT_DEFAULT_PASSWORD: &str = "spi123";

/// Characters used for generated one-time passwords. Printable and
/// unambiguous enough to read back over a phone.
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789!@#$%&*";

/// Hashes a plaintext password at the default bcrypt cost.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    hash_password_with_cost(plain, DEFAULT_COST)
}

/// Hashes at an explicit cost. Tests use the bcrypt minimum to stay fast.
pub fn hash_password_with_cost(plain: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(plain, cost).map_err(|e| AuthError::Server(format!("bcrypt hash failed: {}", e)))
}

/// Compares a plaintext candidate against a stored hash.
pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, AuthError> {
    bcrypt::verify(plain, hashed)
        .map_err(|e| AuthError::Server(format!("bcrypt verify failed: {}", e)))
}

/// Generates a random printable password for auto-created teacher/student
/// accounts. The caller returns it to the client exactly once; only the hash
/// is kept.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost; production paths use DEFAULT_COST.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_is_salted_and_verifiable() {
        let h1 = hash_password_with_cost("hunter2", TEST_COST).unwrap();
        let h2 = hash_password_with_cost("hunter2", TEST_COST).unwrap();
        assert_ne!(h1, "hunter2");
        assert_ne!(h1, h2, "salting must make identical inputs differ");
        assert!(verify_password("hunter2", &h1).unwrap());
        assert!(verify_password("hunter2", &h2).unwrap());
        assert!(!verify_password("hunter3", &h1).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn generated_passwords_have_requested_length() {
        for len in [8, 12, 20] {
            let pw = generate_password(len);
            assert_eq!(pw.chars().count(), len);
            assert!(pw.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn generated_passwords_differ() {
        let a = generate_password(12);
        let b = generate_password(12);
        assert_ne!(a, b);
    }

    #[test]
    fn parent_default_is_fixed() {
        assert_eq!(PARENT_DEFAULT_PASSWORD, "spi123");
    }
}
