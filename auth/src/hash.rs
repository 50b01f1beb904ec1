//! Credential hashing.
//!
//! Argon2id with per-credential random salts, encoded as PHC strings.
//! Verification is a one-way comparison; the plaintext is never stored.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

/// Errors from credential hashing.
#[derive(Debug, Error)]
pub enum HashError {
    /// The hashing algorithm rejected the input.
    #[error("Credential hashing failed: {0}")]
    Hashing(String),
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::Hashing(e.to_string()))
}

/// Verify a password against a stored PHC string.
///
/// Any parse or verification failure yields `false`; callers cannot tell a
/// malformed hash apart from a wrong password.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
