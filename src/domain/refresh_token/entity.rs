//! Refresh token entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::storage::{IndexEntry, StorageEntity, StorageKey};
use crate::domain::user::{validate_user_id, UserId};
use crate::domain::DomainError;

/// Index of token secrets
pub const TOKEN_INDEX: &str = "token";
/// Index grouping token IDs by owning user
pub const USER_ID_INDEX: &str = "user_id";

/// Refresh token identifier - ASCII alphanumeric, usually a ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefreshTokenId(String);

impl RefreshTokenId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_user_id(&id)
            .map_err(|e| DomainError::validation(format!("Invalid refresh token ID: {}", e)))?;
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefreshTokenId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RefreshTokenId> for String {
    fn from(id: RefreshTokenId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for RefreshTokenId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Session-continuation credential
///
/// Records are replaced whole on save. Revocation stores the same record with
/// `revoked = true`; a revoked record is final and cannot be replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    id: RefreshTokenId,
    user_id: UserId,
    token: String,
    #[serde(default)]
    revoked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(id: RefreshTokenId, user_id: UserId, token: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            user_id,
            token: token.into(),
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh active token with generated ID and secret
    pub fn issue(user_id: UserId) -> Self {
        Self::new(
            RefreshTokenId::generate(),
            user_id,
            ulid::Ulid::new().to_string(),
        )
    }

    pub fn id(&self) -> &RefreshTokenId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The same record marked as revoked
    pub fn revoke(mut self) -> Self {
        self.revoked = true;
        self
    }
}

impl StorageEntity for RefreshToken {
    type Key = RefreshTokenId;

    const FAMILY: &'static str = "refresh_tokens";
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> Self::Key {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.token.is_empty() {
            return Err(DomainError::validation("Refresh token secret cannot be empty"));
        }

        if !self.token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(
                "Refresh token secret must be alphanumeric",
            ));
        }

        Ok(())
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::unique(
                TOKEN_INDEX,
                self.token.clone(),
                json!({ "id": self.id.as_str(), "token": self.token }),
            ),
            IndexEntry::grouped(USER_ID_INDEX, self.user_id.as_str(), self.id.as_str()),
        ]
    }

    fn prepare_save(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn check_replace(&self, previous: &Self) -> Result<(), DomainError> {
        if previous.revoked {
            return Err(DomainError::token_revoked(format!(
                "Refresh token '{}' has been revoked",
                self.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_token() -> RefreshToken {
        RefreshToken::new(
            RefreshTokenId::new("tok1").unwrap(),
            UserId::new("user1").unwrap(),
            "secret1",
        )
    }

    #[test]
    fn test_issue_generates_distinct_values() {
        let a = RefreshToken::issue(UserId::new("user1").unwrap());
        let b = RefreshToken::issue(UserId::new("user1").unwrap());

        assert_ne!(a.id(), b.id());
        assert_ne!(a.token(), b.token());
        assert!(!a.is_revoked());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!(RefreshTokenId::new("").is_err());
        assert!(RefreshTokenId::new("a/b").is_err());
    }

    #[test]
    fn test_validate_secret() {
        let token = RefreshToken::new(
            RefreshTokenId::new("tok1").unwrap(),
            UserId::new("user1").unwrap(),
            "",
        );
        assert!(token.validate().is_err());
    }

    #[test]
    fn test_revoked_record_is_final() {
        let revoked = create_test_token().revoke();
        let active = create_test_token();

        assert!(matches!(
            active.check_replace(&revoked),
            Err(DomainError::TokenRevoked { .. })
        ));
        assert!(matches!(
            revoked.check_replace(&revoked),
            Err(DomainError::TokenRevoked { .. })
        ));
        assert!(revoked.check_replace(&active).is_ok());
        assert!(active.check_replace(&active).is_ok());
    }

    #[test]
    fn test_index_entries() {
        let entries = create_test_token().index_entries();

        assert_eq!(entries[0].index, TOKEN_INDEX);
        assert_eq!(entries[0].key, "secret1");
        assert_eq!(entries[0].projection["id"], "tok1");
        assert_eq!(entries[1].key, "user1/tok1");
        assert!(!entries[1].unique);
    }
}
