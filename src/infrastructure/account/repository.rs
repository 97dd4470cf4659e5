//! Storage-backed account repository implementation

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::account::{Account, AccountKey, AccountRepository};
use crate::domain::context::Context;
use crate::domain::pagination::{page_limit, Page, DEFAULT_PAGE_LIMIT};
use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Storage-backed implementation of AccountRepository
#[derive(Debug)]
pub struct StorageAccountRepository {
    storage: Arc<dyn Storage<Account>>,
}

impl StorageAccountRepository {
    /// Create a new storage-backed repository
    pub fn new(storage: Arc<dyn Storage<Account>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AccountRepository for StorageAccountRepository {
    async fn save(&self, ctx: &Context, account: Account) -> Result<Account, DomainError> {
        self.storage.save(ctx, account).await
    }

    async fn find(&self, ctx: &Context, key: &AccountKey) -> Result<Account, DomainError> {
        self.storage
            .get(ctx, key)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Account '{}' not found", key)))
    }

    async fn exists(&self, ctx: &Context, key: &AccountKey) -> Result<bool, DomainError> {
        self.storage.exists(ctx, key).await
    }

    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<Account>, DomainError> {
        let limit = page_limit(limit);
        let accounts = self.storage.scan(ctx, "", cursor, limit).await?;

        Ok(Page::new(accounts, limit, |a| a.key().as_str().to_string()))
    }

    async fn find_all_for_user(
        &self,
        ctx: &Context,
        user_id: &UserId,
    ) -> Result<Vec<Account>, DomainError> {
        let prefix = AccountKey::user_prefix(user_id);
        let mut accounts = Vec::new();
        let mut after = String::new();

        loop {
            let batch = self
                .storage
                .scan(ctx, &prefix, &after, DEFAULT_PAGE_LIMIT)
                .await?;
            let done = batch.len() < DEFAULT_PAGE_LIMIT;

            if let Some(last) = batch.last() {
                after = last.key().as_str().to_string();
            }
            accounts.extend(batch);

            if done {
                return Ok(accounts);
            }
        }
    }

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError> {
        self.storage.count(ctx).await
    }

    async fn delete(&self, ctx: &Context, key: &AccountKey) -> Result<(), DomainError> {
        self.storage.delete(ctx, key).await?;
        Ok(())
    }

    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError> {
        self.storage.clear(ctx).await
    }
}
