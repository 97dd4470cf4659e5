//! Outbound verification mail
//!
//! Delivery itself is not part of this crate. `NoopMailer` drops every mail
//! and `LoggingMailer` records what would have been sent.

use async_trait::async_trait;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

use crate::domain::user::{validate_email, User, VerificationKind};
use crate::domain::DomainError;

/// Capability for sending verification mails to users
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Rejects addresses the mailer cannot deliver to
    fn validate_email(&self, email: &str) -> Result<(), DomainError> {
        validate_email(email).map_err(|e| DomainError::validation(e.to_string()))
    }

    /// Signup confirmation carrying the user's confirmation token
    async fn confirmation_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError>;

    /// Password recovery carrying the user's recovery token
    async fn recovery_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError>;

    /// Email change confirmation sent to the staged address
    async fn email_change_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError>;
}

/// Sends nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn confirmation_mail(&self, _user: &User, _referrer_url: &str) -> Result<(), DomainError> {
        Ok(())
    }

    async fn recovery_mail(&self, _user: &User, _referrer_url: &str) -> Result<(), DomainError> {
        Ok(())
    }

    async fn email_change_mail(&self, _user: &User, _referrer_url: &str) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Logs every mail instead of delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMailer;

impl LoggingMailer {
    fn log(user: &User, kind: VerificationKind, recipient: &str, referrer_url: &str) {
        tracing::info!(
            user_id = %user.id(),
            kind = %kind,
            recipient = recipient,
            referrer_url = referrer_url,
            token = user.verification_token(kind),
            "Verification mail"
        );
    }
}

#[async_trait]
impl Mailer for LoggingMailer {
    async fn confirmation_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError> {
        Self::log(user, VerificationKind::Confirmation, user.email(), referrer_url);
        Ok(())
    }

    async fn recovery_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError> {
        Self::log(user, VerificationKind::Recovery, user.email(), referrer_url);
        Ok(())
    }

    async fn email_change_mail(&self, user: &User, referrer_url: &str) -> Result<(), DomainError> {
        Self::log(user, VerificationKind::EmailChange, user.new_email(), referrer_url);
        Ok(())
    }
}
