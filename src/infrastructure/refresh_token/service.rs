//! Refresh token rotation and revocation

use std::sync::Arc;

use crate::domain::context::Context;
use crate::domain::refresh_token::{RefreshToken, RefreshTokenId, RefreshTokenRepository};
use crate::domain::user::User;
use crate::domain::DomainError;

/// Issues, rotates and revokes refresh tokens
#[derive(Debug, Clone)]
pub struct RefreshTokenService {
    repository: Arc<dyn RefreshTokenRepository>,
}

impl RefreshTokenService {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>) -> Self {
        Self { repository }
    }

    /// Issue a new active token for an authenticated user
    pub async fn grant_authenticated_user(
        &self,
        ctx: &Context,
        user: &User,
    ) -> Result<RefreshToken, DomainError> {
        let token = self
            .repository
            .save(ctx, RefreshToken::issue(user.id().clone()))
            .await?;

        metrics::counter!("refresh_tokens_granted_total").increment(1);
        tracing::info!(user_id = %user.id(), token_id = %token.id(), "Refresh token granted");

        Ok(token)
    }

    /// Revoke the presented token and issue its successor
    ///
    /// Presenting a token that is already revoked means it was used twice,
    /// so the swap fails with `TokenRevoked`. Storage refuses to replace a
    /// revoked record, so of two concurrent swaps of one token only the
    /// first to save wins.
    pub async fn grant_refresh_token_swap(
        &self,
        ctx: &Context,
        user: &User,
        presented: &RefreshToken,
    ) -> Result<RefreshToken, DomainError> {
        let current = self.repository.find_by_id(ctx, presented.id()).await?;

        if presented.is_revoked() || current.is_revoked() {
            return Err(Self::reused(
                user,
                &current,
                DomainError::token_revoked(format!(
                    "Refresh token '{}' has been revoked",
                    current.id()
                )),
            ));
        }

        match self.repository.save(ctx, current.clone().revoke()).await {
            Ok(_) => {}
            Err(e) if e.is_token_revoked() => return Err(Self::reused(user, &current, e)),
            Err(e) => return Err(e),
        }
        metrics::counter!("refresh_token_swaps_total").increment(1);

        self.grant_authenticated_user(ctx, user).await
    }

    fn reused(user: &User, token: &RefreshToken, error: DomainError) -> DomainError {
        metrics::counter!("refresh_token_reuse_total").increment(1);
        tracing::error!(
            user_id = %user.id(),
            token_id = %token.id(),
            "Revoked refresh token presented"
        );
        error
    }

    pub async fn find_refresh_token_by_id(
        &self,
        ctx: &Context,
        id: &RefreshTokenId,
    ) -> Result<RefreshToken, DomainError> {
        self.repository.find_by_id(ctx, id).await
    }

    pub async fn find_refresh_token_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<RefreshToken, DomainError> {
        self.repository.find_by_token(ctx, token).await
    }

    /// Mark a token as revoked; unknown tokens are ignored
    pub async fn revoke(&self, ctx: &Context, id: &RefreshTokenId) -> Result<(), DomainError> {
        let token = match self.repository.find_by_id(ctx, id).await {
            Ok(token) => token,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        if token.is_revoked() {
            return Ok(());
        }

        match self.repository.save(ctx, token.revoke()).await {
            Ok(_) => {}
            Err(e) if e.is_token_revoked() => return Ok(()),
            Err(e) => return Err(e),
        }
        tracing::info!(token_id = %id, "Refresh token revoked");

        Ok(())
    }

    /// Delete every refresh token of the user
    ///
    /// Pages are re-read from the start until one comes back empty, so tokens
    /// granted while the loop runs are removed too.
    pub async fn logout(&self, ctx: &Context, user: &User) -> Result<(), DomainError> {
        let mut deleted = 0usize;

        loop {
            let page = self
                .repository
                .find_all_for_user(ctx, user.id().as_str(), "", 0)
                .await?;

            if page.is_empty() {
                break;
            }

            for token in &page.items {
                self.repository.delete_by_id(ctx, token.id()).await?;
            }
            deleted += page.len();
        }

        tracing::info!(user_id = %user.id(), deleted, "User logged out");
        Ok(())
    }
}
