//! Account entity: a link between a user and an authentication provider

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Authentication provider behind an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local email + password credentials
    Password,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
        }
    }
}

impl FromStr for ProviderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            other => Err(DomainError::validation(format!(
                "Unknown provider type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite account key `{user_id}/{provider}/{federated_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey(String);

impl AccountKey {
    pub fn new(user_id: &UserId, provider: ProviderType, federated_id: &str) -> Self {
        Self(format!("{}/{}/{}", user_id, provider, federated_id))
    }

    /// Key prefix shared by all accounts of one user
    pub fn user_prefix(user_id: &UserId) -> String {
        format!("{}/", user_id)
    }
}

impl StorageKey for AccountKey {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    user_id: UserId,
    provider: ProviderType,
    federated_id: String,
}

impl Account {
    pub fn new(user_id: UserId, provider: ProviderType, federated_id: impl Into<String>) -> Self {
        Self {
            user_id,
            provider,
            federated_id: federated_id.into(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    pub fn federated_id(&self) -> &str {
        &self.federated_id
    }

    pub fn set_federated_id(&mut self, federated_id: impl Into<String>) {
        self.federated_id = federated_id.into();
    }
}

impl StorageEntity for Account {
    type Key = AccountKey;

    const FAMILY: &'static str = "accounts";
    const KEY_FIELD: &'static str = "user_id";

    fn key(&self) -> Self::Key {
        AccountKey::new(&self.user_id, self.provider, &self.federated_id)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.federated_id.is_empty() {
            return Err(DomainError::validation("Account federated ID cannot be empty"));
        }

        Ok(())
    }
}
