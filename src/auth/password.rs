//! Password hashing and verification.
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;

/// A stored one-way password hash in PHC string format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a hash read back from storage. The string is not validated here;
    /// a malformed value simply never verifies.
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Credential(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash(secret: &str) -> Result<Credential, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)?
        .to_string();
    Ok(Credential(hash))
}

/// Verify a password against a stored credential.
pub fn verify(secret: &str, credential: &Credential) -> bool {
    let parsed_hash = match PasswordHash::new(credential.as_str()) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}
