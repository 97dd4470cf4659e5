//! Session service tying users, accounts, refresh tokens and access tokens together

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::account::{Account, ProviderType};
use crate::domain::context::Context;
use crate::domain::user::User;
use crate::domain::DomainError;
use crate::infrastructure::account::AccountService;
use crate::infrastructure::auth::TokenService;
use crate::infrastructure::mailer::Mailer;
use crate::infrastructure::refresh_token::RefreshTokenService;
use crate::infrastructure::repositories::Repositories;
use crate::infrastructure::user::{
    CreateUserRequest, PasswordHasher, UserService, VerificationService, DEFAULT_MAX_FREQUENCY,
};

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(rename = "access_token")]
    pub token: String,
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
    pub refresh_token: String,
}

impl AccessTokenResponse {
    fn bearer(token: String, expires_in: u64, refresh_token: String) -> Self {
        Self {
            token,
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token,
        }
    }
}

/// Signup behaviour
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Confirm users at signup instead of mailing a confirmation token
    pub autoconfirm: bool,
    /// Minimum interval between two verification mails of the same kind
    pub max_frequency: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autoconfirm: false,
            max_frequency: DEFAULT_MAX_FREQUENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionService {
    users: UserService,
    accounts: AccountService,
    refresh_tokens: RefreshTokenService,
    verification: VerificationService,
    tokens: Arc<dyn TokenService>,
    autoconfirm: bool,
}

impl SessionService {
    pub fn new(
        repositories: &Repositories,
        hasher: Arc<dyn PasswordHasher>,
        mailer: Arc<dyn Mailer>,
        tokens: Arc<dyn TokenService>,
        config: SessionConfig,
    ) -> Self {
        let users: UserService = UserService::new(Arc::clone(&repositories.users), hasher);
        let verification = VerificationService::new(users.clone(), mailer, config.max_frequency);

        Self {
            users,
            accounts: AccountService::new(Arc::clone(&repositories.accounts)),
            refresh_tokens: RefreshTokenService::new(Arc::clone(&repositories.refresh_tokens)),
            verification,
            tokens,
            autoconfirm: config.autoconfirm,
        }
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenService {
        &self.refresh_tokens
    }

    pub fn verification(&self) -> &VerificationService {
        &self.verification
    }

    /// Register a user with a password account
    ///
    /// The user is either confirmed right away or sent a confirmation mail.
    pub async fn sign_up(
        &self,
        ctx: &Context,
        request: CreateUserRequest,
        referrer_url: &str,
    ) -> Result<User, DomainError> {
        let mut user = self.users.create_user(ctx, request).await?;

        self.accounts
            .create_account(
                ctx,
                Account::new(user.id().clone(), ProviderType::Password, user.email()),
            )
            .await?;

        if self.autoconfirm {
            user = self.users.confirm_user(ctx, user.id()).await?;
        } else {
            self.verification
                .send_confirmation(ctx, &mut user, referrer_url)
                .await?;
        }

        tracing::info!(user_id = %user.id(), autoconfirm = self.autoconfirm, "User signed up");
        Ok(user)
    }

    /// Authenticate with username or email and password, then open a session
    pub async fn password_grant(
        &self,
        ctx: &Context,
        identifier: &str,
        password: &str,
        ip: Option<&str>,
    ) -> Result<AccessTokenResponse, DomainError> {
        let user = self.users.authenticate(ctx, identifier, password).await?;
        self.issue_session(ctx, &user, ip).await
    }

    /// Grant a refresh token and sign an access token for the user
    pub async fn issue_session(
        &self,
        ctx: &Context,
        user: &User,
        ip: Option<&str>,
    ) -> Result<AccessTokenResponse, DomainError> {
        let refresh_token = self.refresh_tokens.grant_authenticated_user(ctx, user).await?;
        let token = self.tokens.sign(self.tokens.claims_for_user(user))?;
        self.users.user_signed_in(ctx, user, ip).await?;

        Ok(AccessTokenResponse::bearer(
            token,
            self.tokens.expires_in(),
            refresh_token.token().to_string(),
        ))
    }

    /// Exchange a refresh token for a new session
    ///
    /// Unknown tokens and tokens of deleted users are `InvalidGrant`; a token
    /// presented twice is `TokenRevoked`.
    pub async fn refresh_session(
        &self,
        ctx: &Context,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse, DomainError> {
        let presented = self
            .refresh_tokens
            .find_refresh_token_by_token(ctx, refresh_token)
            .await
            .map_err(invalid_grant)?;

        let user = self
            .users
            .find_user_by_id(ctx, presented.user_id())
            .await
            .map_err(invalid_grant)?;

        let next = self
            .refresh_tokens
            .grant_refresh_token_swap(ctx, &user, &presented)
            .await?;
        let token = self.tokens.sign(self.tokens.claims_for_user(&user))?;

        Ok(AccessTokenResponse::bearer(
            token,
            self.tokens.expires_in(),
            next.token().to_string(),
        ))
    }

    /// Drop every refresh token of the user
    pub async fn logout(&self, ctx: &Context, user: &User) -> Result<(), DomainError> {
        self.refresh_tokens.logout(ctx, user).await
    }
}

fn invalid_grant(e: DomainError) -> DomainError {
    if e.is_not_found() {
        DomainError::invalid_grant("Invalid refresh token")
    } else {
        e
    }
}
