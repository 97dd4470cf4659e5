//! authzy
//!
//! Identity storage and session engine:
//! - Users, provider accounts and refresh tokens with secondary indexes
//! - In-memory (JSON snapshot) and redb key-value storage backends
//! - Signup verification, refresh token rotation and JWT access tokens

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use infrastructure::auth::{JwksTokenService, TokenService};
use infrastructure::mailer::{LoggingMailer, Mailer};
use infrastructure::session::SessionService;
use infrastructure::user::{Argon2Hasher, PasswordHasher};
use infrastructure::Repositories;
use tracing::info;

/// Services of one running process
#[derive(Debug, Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub tokens: Arc<dyn TokenService>,
    pub sessions: SessionService,
}

/// Create the application state from configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage = config.storage_config()?;
    info!(backend = %storage.storage_type(), "Opening storage");
    let repositories = Repositories::open(&storage).await?;

    create_app_state_with_repositories(config, repositories)
}

/// Create the application state on already opened repositories
pub fn create_app_state_with_repositories(
    config: &AppConfig,
    repositories: Repositories,
) -> anyhow::Result<AppState> {
    let tokens: Arc<dyn TokenService> = Arc::new(JwksTokenService::new(&config.jwt)?);
    let hasher: Arc<dyn PasswordHasher> =
        Arc::new(Argon2Hasher::with_config(&config.hashers.argon2)?);
    let mailer: Arc<dyn Mailer> = Arc::new(LoggingMailer);

    let sessions = SessionService::new(
        &repositories,
        hasher,
        mailer,
        Arc::clone(&tokens),
        config.session_config(),
    );

    Ok(AppState {
        repositories,
        tokens,
        sessions,
    })
}
