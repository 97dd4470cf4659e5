//! Refresh token repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{RefreshToken, RefreshTokenId};
use crate::domain::context::Context;
use crate::domain::pagination::Page;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Repository trait for refresh token storage
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + Debug {
    /// Validate and persist a token, replacing any previous version
    async fn save(&self, ctx: &Context, token: RefreshToken) -> Result<RefreshToken, DomainError>;

    async fn find_by_id(
        &self,
        ctx: &Context,
        id: &RefreshTokenId,
    ) -> Result<RefreshToken, DomainError>;

    /// Get a token by its secret
    async fn find_by_token(&self, ctx: &Context, token: &str) -> Result<RefreshToken, DomainError>;

    async fn exists_by_id(&self, ctx: &Context, id: &RefreshTokenId)
        -> Result<bool, DomainError>;

    /// Page through tokens ordered by ID
    async fn find_all(
        &self,
        ctx: &Context,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<RefreshToken>, DomainError>;

    /// Page through one user's tokens ordered by ID; an empty user ID is invalid
    async fn find_all_for_user(
        &self,
        ctx: &Context,
        user_id: &str,
        cursor: &str,
        limit: i64,
    ) -> Result<Page<RefreshToken>, DomainError>;

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError>;

    /// Delete a token; deleting a missing token is not an error
    async fn delete_by_id(&self, ctx: &Context, id: &RefreshTokenId) -> Result<(), DomainError>;

    async fn delete_all(&self, ctx: &Context) -> Result<(), DomainError>;
}
