//! Password hashing and verification.

use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params};

use crate::StoreError;

const ARGON2_PREFIX: &str = "$argon2";

/// A stored password credential.
///
/// Normally an argon2 PHC string (`$argon2id$v=19$...`). Rows written before
/// hashing was introduced hold the raw password; those are compared as-is.
/// A value that starts like an argon2 hash but doesn't parse matches nothing.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordSecret(String);

impl PasswordSecret {
    /// Wraps a value read back from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The value to persist.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the secret is a hash rather than a legacy plaintext.
    pub fn is_hashed(&self) -> bool {
        PasswordHash::new(&self.0).is_ok()
    }

    /// Checks `password` against this secret.
    pub fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.0) {
            // Cost parameters come from the hash string itself.
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) if self.0.starts_with(ARGON2_PREFIX) => {
                tracing::error!("stored password hash is malformed");
                false
            }
            Err(_) => self.0 == password,
        }
    }
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordSecret(..)")
    }
}

/// Produces salted argon2id secrets.
#[derive(Clone, Default)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Creates a hasher with an explicit cost.
    ///
    /// `memory_kib` is the argon2 memory size in KiB (at least 8) and
    /// `iterations` the number of passes (at least 1).
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, StoreError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| StoreError::InvalidCost(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }

    /// Hashes a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<PasswordSecret, StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StoreError::Hash(e.to_string()))?;
        Ok(PasswordSecret(hash.to_string()))
    }
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}
