//! Verification token issuance and redemption

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::context::Context;
use crate::domain::user::{User, VerificationKind};
use crate::domain::DomainError;
use crate::infrastructure::mailer::Mailer;

use super::service::UserService;

/// How long an emailed token stays redeemable
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Default minimum interval between two mails of the same kind
pub const DEFAULT_MAX_FREQUENCY: Duration = Duration::from_secs(300);

/// Issues emailed verification tokens and redeems them
#[derive(Debug, Clone)]
pub struct VerificationService {
    users: UserService,
    mailer: Arc<dyn Mailer>,
    max_frequency: Duration,
}

impl VerificationService {
    pub fn new(users: UserService, mailer: Arc<dyn Mailer>, max_frequency: Duration) -> Self {
        Self {
            users,
            mailer,
            max_frequency,
        }
    }

    /// Send a fresh signup confirmation token
    pub async fn send_confirmation(
        &self,
        ctx: &Context,
        user: &mut User,
        referrer_url: &str,
    ) -> Result<(), DomainError> {
        self.send(ctx, VerificationKind::Confirmation, user, None, referrer_url)
            .await
    }

    /// Send a fresh password recovery token
    pub async fn send_recovery(
        &self,
        ctx: &Context,
        user: &mut User,
        referrer_url: &str,
    ) -> Result<(), DomainError> {
        self.send(ctx, VerificationKind::Recovery, user, None, referrer_url)
            .await
    }

    /// Stage `new_email` and send a token confirming the change
    pub async fn send_email_change(
        &self,
        ctx: &Context,
        user: &mut User,
        new_email: &str,
        referrer_url: &str,
    ) -> Result<(), DomainError> {
        let new_email = new_email.to_lowercase();
        self.mailer.validate_email(&new_email)?;

        match self.users.find_user_by_email(ctx, &new_email).await {
            Ok(owner) if owner.id() != user.id() => {
                return Err(DomainError::already_exists(format!(
                    "Email '{}' is already registered",
                    new_email
                )));
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.send(
            ctx,
            VerificationKind::EmailChange,
            user,
            Some(new_email),
            referrer_url,
        )
        .await
    }

    /// Confirm the user holding a signup token
    pub async fn verify_signup(&self, ctx: &Context, token: &str) -> Result<User, DomainError> {
        let user = self.redeemable(ctx, VerificationKind::Confirmation, token).await?;
        self.users.confirm_user(ctx, user.id()).await
    }

    /// Consume a recovery token
    pub async fn verify_recovery(&self, ctx: &Context, token: &str) -> Result<User, DomainError> {
        let user = self.redeemable(ctx, VerificationKind::Recovery, token).await?;
        let user = self.users.confirm_recovery(ctx, user).await?;

        tracing::info!(user_id = %user.id(), "Recovery token redeemed");
        Ok(user)
    }

    /// Apply a staged email change
    pub async fn verify_email_change(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        let user = self.redeemable(ctx, VerificationKind::EmailChange, token).await?;
        self.users.confirm_email_change(ctx, user).await
    }

    async fn send(
        &self,
        ctx: &Context,
        kind: VerificationKind,
        user: &mut User,
        new_email: Option<String>,
        referrer_url: &str,
    ) -> Result<(), DomainError> {
        let id = user.id().clone();
        *user = self.users.find_user_by_id(ctx, &id).await?;
        let now = Utc::now();

        if let Some(sent_at) = user.verification_sent_at(kind) {
            let elapsed = (now - sent_at).to_std().unwrap_or(Duration::ZERO);
            if elapsed <= self.max_frequency {
                tracing::warn!(user_id = %user.id(), kind = %kind, "Verification mail throttled");
                return Err(DomainError::rate_limited(format!(
                    "A {} mail can only be requested once every {} seconds",
                    kind,
                    self.max_frequency.as_secs()
                )));
            }
        }

        let previous_token = user.set_verification_token(kind, ulid::Ulid::new().to_string());
        let previous_email = new_email.map(|email| user.stage_new_email(email));

        let sent = match kind {
            VerificationKind::Confirmation => self.mailer.confirmation_mail(user, referrer_url).await,
            VerificationKind::Recovery => self.mailer.recovery_mail(user, referrer_url).await,
            VerificationKind::EmailChange => self.mailer.email_change_mail(user, referrer_url).await,
        };

        if let Err(e) = sent {
            user.set_verification_token(kind, previous_token);
            if let Some(previous_email) = previous_email {
                user.stage_new_email(previous_email);
            }
            tracing::error!(user_id = %user.id(), kind = %kind, error = %e, "Sending verification mail failed");
            return Err(e);
        }

        metrics::counter!("verification_mails_sent_total", "kind" => kind.as_str()).increment(1);

        user.set_verification_sent_at(kind, now);
        *user = self.users.update_user(ctx, user.clone()).await?;

        tracing::info!(user_id = %user.id(), kind = %kind, "Verification mail sent");
        Ok(())
    }

    async fn redeemable(
        &self,
        ctx: &Context,
        kind: VerificationKind,
        token: &str,
    ) -> Result<User, DomainError> {
        if token.is_empty() {
            return Err(DomainError::validation("A verification token is required"));
        }

        let found = match kind {
            VerificationKind::Confirmation => {
                self.users.find_user_by_confirmation_token(ctx, token).await
            }
            VerificationKind::Recovery => self.users.find_user_by_recovery_token(ctx, token).await,
            VerificationKind::EmailChange => {
                self.users.find_user_by_email_change_token(ctx, token).await
            }
        };

        let user = match found {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                tracing::warn!(kind = %kind, "Unknown verification token");
                return Err(DomainError::not_found(format!("Invalid {} token", kind)));
            }
            Err(e) => return Err(e),
        };

        if let Some(sent_at) = user.verification_sent_at(kind) {
            let age = (Utc::now() - sent_at).to_std().unwrap_or(Duration::ZERO);
            if age > TOKEN_LIFETIME {
                tracing::warn!(user_id = %user.id(), kind = %kind, "Verification token expired");
                return Err(DomainError::expired(format!("{} token expired", kind)));
            }
        }

        Ok(user)
    }
}
