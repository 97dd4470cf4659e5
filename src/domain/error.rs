use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Already exists: {message}")]
    AlreadyExists { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Expired: {message}")]
    Expired { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Backend error in {operation} for key '{key}': {message}")]
    Backend {
        operation: String,
        key: String,
        message: String,
    },

    #[error("Refresh token revoked: {message}")]
    TokenRevoked { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Wraps a storage engine or codec failure with the operation tag and key
    pub fn backend(
        operation: impl Into<String>,
        key: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            key: key.into(),
            message: error.to_string(),
        }
    }

    pub fn token_revoked(message: impl Into<String>) -> Self {
        Self::TokenRevoked {
            message: message.into(),
        }
    }

    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_token_revoked(&self) -> bool {
        matches!(self, Self::TokenRevoked { .. })
    }
}
