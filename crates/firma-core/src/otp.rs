//! One-time passcode generation and hashing
//!
//! Codes are 6 decimal digits drawn from the OS RNG. Only the Argon2id
//! hash is ever persisted; verification goes through
//! `Argon2::verify_password`, which compares against the salted hash in
//! constant time.

use argon2::{
    password_hash::{rand_core::OsRng as HashRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use thiserror::Error;

/// Number of digits in a generated code.
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum OtpHashError {
    #[error("failed to hash code: {0}")]
    Hash(String),
}

/// Generate a fresh 6-digit numeric code.
pub fn generate_code() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hash a code with Argon2id and a random salt (PHC string output).
pub fn hash_code(code: &str) -> Result<String, OtpHashError> {
    let salt = SaltString::generate(&mut HashRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| OtpHashError::Hash(e.to_string()))
}

/// Verify a code against a stored hash.
///
/// Returns `false` for a mismatch or an unparseable hash; the caller
/// never learns which.
pub fn verify_code(code: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(code.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
