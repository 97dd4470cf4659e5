//! User validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use validator::{ValidateEmail, ValidateUrl};

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("User ID cannot be empty")]
    EmptyId,

    #[error("User ID contains invalid character: '{0}'. Only alphanumeric characters are allowed")]
    InvalidIdCharacter(char),

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Email '{0}' is not a valid address")]
    InvalidEmail(String),

    #[error("Email '{0}' must be lowercase")]
    EmailNotLowercase(String),

    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Username '{0}' must be 3-32 characters of letters, digits, '_' or '-', starting with a letter or digit")]
    InvalidUsername(String),

    #[error("Normalized username '{0}' must be the lowercase form of the username")]
    InvalidNormalizedUsername(String),

    #[error("Picture '{0}' is not a valid URL")]
    InvalidPicture(String),

    #[error("Password cannot be empty")]
    EmptyPassword,
}

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]{2,31}$").unwrap());

/// Validate a record ID: non-empty ASCII alphanumeric
pub fn validate_user_id(id: &str) -> Result<(), UserValidationError> {
    if id.is_empty() {
        return Err(UserValidationError::EmptyId);
    }

    match id.chars().find(|c| !c.is_ascii_alphanumeric()) {
        Some(c) => Err(UserValidationError::InvalidIdCharacter(c)),
        None => Ok(()),
    }
}

/// Validate a stored email: present, lowercase, well formed
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if email.is_empty() {
        return Err(UserValidationError::EmptyEmail);
    }

    if email != email.to_lowercase() {
        return Err(UserValidationError::EmailNotLowercase(email.to_string()));
    }

    if !email.validate_email() {
        return Err(UserValidationError::InvalidEmail(email.to_string()));
    }

    Ok(())
}

/// Validate a username
///
/// Rules:
/// - Cannot be empty
/// - 3 to 32 characters
/// - Letters, digits, underscores and hyphens
/// - Starts with a letter or digit
pub fn validate_username(username: &str) -> Result<(), UserValidationError> {
    if username.is_empty() {
        return Err(UserValidationError::EmptyUsername);
    }

    if !USERNAME_PATTERN.is_match(username) {
        return Err(UserValidationError::InvalidUsername(username.to_string()));
    }

    Ok(())
}

/// Validate that the normalized username is the lowercase username
pub fn validate_normalized_username(
    username: &str,
    normalized: &str,
) -> Result<(), UserValidationError> {
    validate_username(normalized)?;

    if normalized != username.to_lowercase() {
        return Err(UserValidationError::InvalidNormalizedUsername(
            normalized.to_string(),
        ));
    }

    Ok(())
}

/// Validate an optional picture URL
pub fn validate_picture(picture: &str) -> Result<(), UserValidationError> {
    if !picture.is_empty() && !picture.validate_url() {
        return Err(UserValidationError::InvalidPicture(picture.to_string()));
    }

    Ok(())
}

/// Validate a plaintext password before hashing
pub fn validate_password(password: &str) -> Result<(), UserValidationError> {
    if password.is_empty() {
        return Err(UserValidationError::EmptyPassword);
    }

    Ok(())
}
