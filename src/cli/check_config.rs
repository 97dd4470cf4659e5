//! Check-config command - validates configuration without opening storage

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::auth::{JwksTokenService, TokenService};
use crate::infrastructure::user::Argon2Hasher;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let storage = config.storage_config()?;
    Argon2Hasher::with_config(&config.hashers.argon2)?;

    let tokens = JwksTokenService::new(&config.jwt)?;
    let claims = tokens.parse(&tokens.sign(tokens.generate("check-config"))?)?;
    tokens.validate(&claims)?;

    info!(backend = %storage.storage_type(), "Configuration is valid");
    println!("configuration ok ({})", storage.storage_type());
    Ok(())
}
