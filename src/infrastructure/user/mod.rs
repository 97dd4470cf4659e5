//! User infrastructure module
//!
//! Password hashing with Argon2, the storage-backed repository, the user
//! service and the verification-token flows.

mod password;
mod repository;
mod service;
mod verification;

#[cfg(test)]
pub use password::MockPasswordHasher;
pub use password::{Argon2Config, Argon2Hasher, PasswordHasher};
pub use repository::StorageUserRepository;
pub use service::{CreateUserRequest, UserService};
pub use verification::{VerificationService, DEFAULT_MAX_FREQUENCY, TOKEN_LIFETIME};
