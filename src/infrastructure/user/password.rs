//! Password hashing utilities using Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::Deserialize;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

use crate::domain::DomainError;

/// Trait for password hashing operations
#[cfg_attr(test, automock)]
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a password
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Verify a password against a hash
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    /// Memory size in KiB
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
    /// Output length in bytes
    pub key_length: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
            key_length: Params::DEFAULT_OUTPUT_LEN,
        }
    }
}

/// Argon2id password hasher
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    /// Create a hasher with the default cost parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher with custom cost parameters
    pub fn with_config(config: &Argon2Config) -> Result<Self, DomainError> {
        let params = Params::new(
            config.memory,
            config.iterations,
            config.parallelism,
            Some(config.key_length),
        )
        .map_err(|e| DomainError::configuration(format!("Invalid argon2 parameters: {}", e)))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::credential(format!("Failed to hash password: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        // Costs are read from the hash itself, so older parameters still verify
        self.argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
