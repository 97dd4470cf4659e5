//! Storage-backed user repository implementation

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::context::Context;
use crate::domain::pagination::{page_limit, Page};
use crate::domain::storage::Storage;
use crate::domain::user::{
    User, UserId, UserRepository, CONFIRMATION_TOKEN_INDEX, EMAIL_CHANGE_TOKEN_INDEX,
    IDENTIFIER_INDEX, RECOVERY_TOKEN_INDEX,
};
use crate::domain::DomainError;

/// Storage-backed implementation of UserRepository
#[derive(Debug)]
pub struct StorageUserRepository {
    storage: Arc<dyn Storage<User>>,
}

impl StorageUserRepository {
    /// Create a new storage-backed repository
    pub fn new(storage: Arc<dyn Storage<User>>) -> Self {
        Self { storage }
    }

    async fn find_indexed(
        &self,
        ctx: &Context,
        index: &str,
        key: &str,
    ) -> Result<User, DomainError> {
        self.storage
            .find_by_index(ctx, index, key)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("No user with {} '{}'", index, key)))
    }
}

#[async_trait]
impl UserRepository for StorageUserRepository {
    async fn save(&self, ctx: &Context, user: User) -> Result<User, DomainError> {
        self.storage.save(ctx, user).await
    }

    async fn find_by_id(&self, ctx: &Context, id: &UserId) -> Result<User, DomainError> {
        self.storage
            .get(ctx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }

    async fn exists_by_id(&self, ctx: &Context, id: &UserId) -> Result<bool, DomainError> {
        self.storage.exists(ctx, id).await
    }

    async fn find_by_identifier(
        &self,
        ctx: &Context,
        identifier: &str,
    ) -> Result<User, DomainError> {
        self.find_indexed(ctx, IDENTIFIER_INDEX, identifier).await
    }

    async fn exists_by_identifier(
        &self,
        ctx: &Context,
        identifier: &str,
    ) -> Result<bool, DomainError> {
        self.storage
            .exists_in_index(ctx, IDENTIFIER_INDEX, identifier)
            .await
    }

    async fn find_by_confirmation_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.find_indexed(ctx, CONFIRMATION_TOKEN_INDEX, token).await
    }

    async fn find_by_recovery_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.find_indexed(ctx, RECOVERY_TOKEN_INDEX, token).await
    }

    async fn find_by_email_change_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.find_indexed(ctx, EMAIL_CHANGE_TOKEN_INDEX, token).await
    }

    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<User>, DomainError> {
        let limit = page_limit(limit);
        let users = self.storage.scan(ctx, "", cursor, limit).await?;

        Ok(Page::new(users, limit, |u| u.id().as_str().to_string()))
    }

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError> {
        self.storage.count(ctx).await
    }

    async fn delete_by_id(&self, ctx: &Context, id: &UserId) -> Result<(), DomainError> {
        self.storage.delete(ctx, id).await?;
        Ok(())
    }

    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError> {
        self.storage.clear(ctx).await
    }
}
