//! The three repositories of one process, sharing one storage backend

use std::sync::Arc;

use serde::Serialize;

use crate::domain::context::Context;
use crate::domain::{Account, AccountRepository, DomainError, RefreshToken, RefreshTokenRepository};
use crate::domain::{User, UserRepository};

use super::account::StorageAccountRepository;
use super::refresh_token::StorageRefreshTokenRepository;
use super::storage::{StorageBackend, StorageConfig, StorageFactory};
use super::user::StorageUserRepository;

/// Number of stored records per entity family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub users: u64,
    pub accounts: u64,
    pub refresh_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl Repositories {
    /// Creates every repository on an opened backend
    pub async fn create(backend: &StorageBackend) -> Result<Self, DomainError> {
        let users = StorageFactory::create::<User>(backend).await?;
        let accounts = StorageFactory::create::<Account>(backend).await?;
        let refresh_tokens = StorageFactory::create::<RefreshToken>(backend).await?;

        Ok(Self {
            users: Arc::new(StorageUserRepository::new(users)),
            accounts: Arc::new(StorageAccountRepository::new(accounts)),
            refresh_tokens: Arc::new(StorageRefreshTokenRepository::new(refresh_tokens)),
        })
    }

    /// Opens the configured backend and creates every repository on it
    pub async fn open(config: &StorageConfig) -> Result<Self, DomainError> {
        let backend = StorageFactory::open(config).await?;
        Self::create(&backend).await
    }

    /// Memory-only repositories
    pub async fn in_memory() -> Result<Self, DomainError> {
        Self::open(&StorageConfig::in_memory()).await
    }

    pub async fn counts(&self, ctx: &Context) -> Result<RecordCounts, DomainError> {
        Ok(RecordCounts {
            users: self.users.count(ctx).await?,
            accounts: self.accounts.count(ctx).await?,
            refresh_tokens: self.refresh_tokens.count(ctx).await?,
        })
    }

    /// Deletes every record of every family
    pub async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError> {
        self.refresh_tokens.delete_all(ctx).await?;
        self.accounts.delete_all(ctx).await?;
        self.users.delete_all(ctx).await?;

        tracing::info!("All records deleted");
        Ok(())
    }
}
