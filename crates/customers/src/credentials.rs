//! Password hashing for stored customer credentials (Argon2id, PHC strings).

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};

use operator_core::{DomainError, DomainResult};

/// Hash a plaintext password into a PHC string.
pub fn hash_password(plain: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| DomainError::validation("password", "hash", format!("could not be hashed: {e}")))
}
