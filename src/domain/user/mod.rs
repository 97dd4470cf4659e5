//! User domain
//!
//! This module provides domain types and traits for identities, including
//! user entities, validation, and repository traits.

mod entity;
mod repository;
mod validation;

pub use entity::{
    token_index, User, UserId, VerificationKind, CONFIRMATION_TOKEN_INDEX,
    EMAIL_CHANGE_TOKEN_INDEX, IDENTIFIER_INDEX, RECOVERY_TOKEN_INDEX,
};
pub use repository::UserRepository;
pub use validation::{
    validate_email, validate_password, validate_user_id, validate_username, UserValidationError,
};
