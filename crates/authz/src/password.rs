//! Argon2id password hashing in PHC string format.
//!
//! Hashing is CPU-bound; the `*_blocking` helpers move it onto tokio's
//! blocking pool so request handlers do not stall the runtime.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use thiserror::Error;

/// Plaintext behind the decoy hash. Never assigned to an account.
const DECOY_PASSWORD: &str = "libris-decoy-credential";

static DECOY_HASH: OnceLock<String> = OnceLock::new();

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(argon2::password_hash::Error),

    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash `password` with a fresh random salt.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordError::Hash(err)),
    }
}

pub async fn hash_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

pub async fn verify_blocking(password: String, stored_hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify(&password, &stored_hash)).await?
}

/// Argon2id hash of a throwaway secret, computed once per process. Verifying
/// against it costs the same as verifying a real account's hash.
pub fn decoy_hash() -> Result<&'static str, PasswordError> {
    if let Some(hash) = DECOY_HASH.get() {
        return Ok(hash);
    }
    let computed = hash(DECOY_PASSWORD)?;
    Ok(DECOY_HASH.get_or_init(|| computed))
}

/// How account passwords are hashed and checked.
#[async_trait]
pub trait PasswordScheme: Send + Sync {
    async fn hash(&self, password: String) -> Result<String, PasswordError>;

    /// `Ok(false)` on mismatch.
    async fn verify(&self, password: String, stored_hash: String) -> Result<bool, PasswordError>;

    /// A hash no password of a real account matches, verified in place of a
    /// missing account's hash.
    async fn decoy(&self) -> Result<String, PasswordError>;
}

/// Argon2id with default parameters, run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Scheme;

#[async_trait]
impl PasswordScheme for Argon2Scheme {
    async fn hash(&self, password: String) -> Result<String, PasswordError> {
        hash_blocking(password).await
    }

    async fn verify(&self, password: String, stored_hash: String) -> Result<bool, PasswordError> {
        verify_blocking(password, stored_hash).await
    }

    async fn decoy(&self) -> Result<String, PasswordError> {
        tokio::task::spawn_blocking(|| decoy_hash().map(str::to_string)).await?
    }
}
