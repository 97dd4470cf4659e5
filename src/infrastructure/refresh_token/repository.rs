//! Storage-backed refresh token repository implementation

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::context::Context;
use crate::domain::pagination::{page_limit, Page};
use crate::domain::refresh_token::{
    RefreshToken, RefreshTokenId, RefreshTokenRepository, TOKEN_INDEX, USER_ID_INDEX,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

/// Storage-backed implementation of RefreshTokenRepository
#[derive(Debug)]
pub struct StorageRefreshTokenRepository {
    storage: Arc<dyn Storage<RefreshToken>>,
}

impl StorageRefreshTokenRepository {
    /// Create a new storage-backed repository
    pub fn new(storage: Arc<dyn Storage<RefreshToken>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RefreshTokenRepository for StorageRefreshTokenRepository {
    async fn save(&self, ctx: &Context, token: RefreshToken) -> Result<RefreshToken, DomainError> {
        self.storage.save(ctx, token).await
    }

    async fn find_by_id(
        &self,
        ctx: &Context,
        id: &RefreshTokenId,
    ) -> Result<RefreshToken, DomainError> {
        self.storage
            .get(ctx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Refresh token '{}' not found", id)))
    }

    async fn find_by_token(&self, ctx: &Context, token: &str) -> Result<RefreshToken, DomainError> {
        self.storage
            .find_by_index(ctx, TOKEN_INDEX, token)
            .await?
            .ok_or_else(|| DomainError::not_found("Refresh token not found"))
    }

    async fn exists_by_id(
        &self,
        ctx: &Context,
        id: &RefreshTokenId,
    ) -> Result<bool, DomainError> {
        self.storage.exists(ctx, id).await
    }

    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<RefreshToken>, DomainError> {
        let limit = page_limit(limit);
        let tokens = self.storage.scan(ctx, "", cursor, limit).await?;

        Ok(Page::new(tokens, limit, |t| t.id().as_str().to_string()))
    }

    async fn find_all_for_user(
        &self,
        ctx: &Context,
        user_id: &str,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<RefreshToken>, DomainError> {
        if user_id.is_empty() {
            return Err(DomainError::validation("user_id must not be empty"));
        }

        let limit = page_limit(limit);
        let tokens = self
            .storage
            .scan_index(ctx, USER_ID_INDEX, user_id, cursor, limit)
            .await?;

        Ok(Page::new(tokens, limit, |t| t.id().as_str().to_string()))
    }

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError> {
        self.storage.count(ctx).await
    }

    async fn delete_by_id(&self, ctx: &Context, id: &RefreshTokenId) -> Result<(), DomainError> {
        self.storage.delete(ctx, id).await?;
        Ok(())
    }

    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError> {
        self.storage.clear(ctx).await
    }
}
