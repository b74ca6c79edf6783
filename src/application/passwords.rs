//! Argon2id password hashing.
//!
//! Hashing is deliberately slow, so both operations run on tokio's blocking
//! pool rather than on a request's worker thread.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tokio::task::{self, JoinError};

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("password worker did not finish: {0}")]
    Worker(#[from] JoinError),
}

/// Hash `password` into a PHC string with a fresh random salt.
pub async fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let password = password.to_owned();
    task::spawn_blocking(move || hash_blocking(&password)).await?
}

/// `Ok(false)` for a wrong password and for a malformed stored hash alike.
pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordHashError> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    Ok(task::spawn_blocking(move || verify_blocking(&password, &stored_hash)).await?)
}

fn hash_blocking(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError::Hash(err.to_string()))
}

fn verify_blocking(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
