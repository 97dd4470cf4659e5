//! Truncate command - deletes every record of the configured backend

use clap::Args;

use crate::config::AppConfig;
use crate::domain::Context;
use crate::infrastructure::Repositories;

#[derive(Args, Debug, Clone)]
pub struct TruncateArgs {
    /// Confirm deletion of all records
    #[arg(long)]
    pub yes: bool,
}

pub async fn run(config: &AppConfig, args: TruncateArgs) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!("refusing to delete every record without --yes");
    }

    let repositories = Repositories::open(&config.storage_config()?).await?;
    let ctx = Context::new();
    let before = repositories.counts(&ctx).await?;

    repositories.delete_all(&ctx).await?;

    println!(
        "deleted {} users, {} accounts, {} refresh tokens",
        before.users, before.accounts, before.refresh_tokens
    );
    Ok(())
}
