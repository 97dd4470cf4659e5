//! Account repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{Account, AccountKey};
use crate::domain::context::Context;
use crate::domain::pagination::Page;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Repository trait for account storage
#[async_trait]
pub trait AccountRepository: Send + Sync + Debug {
    /// Validate and persist an account
    async fn save(&self, ctx: &Context, account: Account) -> Result<Account, DomainError>;

    /// Get an account by its composite key, `NotFound` if absent
    async fn find(&self, ctx: &Context, key: &AccountKey) -> Result<Account, DomainError>;

    async fn exists(&self, ctx: &Context, key: &AccountKey) -> Result<bool, DomainError>;

    /// Page through accounts ordered by key
    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<Account>, DomainError>;

    /// Every account linked to a user
    async fn find_all_for_user(
        &self,
        ctx: &Context,
        user_id: &UserId,
    ) -> Result<Vec<Account>, DomainError>;

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError>;

    /// Delete an account; deleting a missing account is not an error
    async fn delete(&self, ctx: &Context, key: &AccountKey) -> Result<(), DomainError>;

    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError>;
}
