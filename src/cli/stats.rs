//! Stats command - prints record counts of the configured backend

use crate::config::AppConfig;
use crate::domain::Context;
use crate::infrastructure::Repositories;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let storage = config.storage_config()?;
    let repositories = Repositories::open(&storage).await?;
    let counts = repositories.counts(&Context::new()).await?;

    println!("backend:        {}", storage.storage_type());
    println!("users:          {}", counts.users);
    println!("accounts:       {}", counts.accounts);
    println!("refresh_tokens: {}", counts.refresh_tokens);

    Ok(())
}
