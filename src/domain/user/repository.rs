//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{User, UserId};
use crate::domain::context::Context;
use crate::domain::pagination::Page;
use crate::domain::DomainError;

/// Repository trait for user storage
///
/// Lookups return `DomainError::NotFound` when nothing matches.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Validate and persist a user with all of its index entries
    async fn save(&self, ctx: &Context, user: User) -> Result<User, DomainError>;

    /// Get a user by ID
    async fn find_by_id(&self, ctx: &Context, id: &UserId) -> Result<User, DomainError>;

    /// Check if a user ID exists
    async fn exists_by_id(&self, ctx: &Context, id: &UserId) -> Result<bool, DomainError>;

    /// Get a user by normalized username or email
    async fn find_by_identifier(&self, ctx: &Context, identifier: &str)
        -> Result<User, DomainError>;

    /// Check if a normalized username or email is taken
    async fn exists_by_identifier(
        &self,
        ctx: &Context,
        identifier: &str,
    ) -> Result<bool, DomainError>;

    async fn find_by_confirmation_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError>;

    async fn find_by_recovery_token(&self, ctx: &Context, token: &str)
        -> Result<User, DomainError>;

    async fn find_by_email_change_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError>;

    /// Page through users ordered by ID
    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<User>, DomainError>;

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError>;

    /// Delete a user; deleting a missing user is not an error
    async fn delete_by_id(&self, ctx: &Context, id: &UserId) -> Result<(), DomainError>;

    /// Remove every user
    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError>;
}
