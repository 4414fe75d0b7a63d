//! Password policy and Argon2id hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::DomainError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, bounding hashing cost.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Returns the policy violation for a candidate password, if any.
pub fn password_policy_violation(password: &str) -> Option<String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Some(format!("must be at most {MAX_PASSWORD_LENGTH} characters"));
    }
    None
}

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))
}

/// Returns true if `password` matches the stored PHC string.
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
