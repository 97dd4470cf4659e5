use clap::Parser;
use authzy::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::bootstrap()?;

    match cli.command {
        Command::Stats => cli::stats::run(&config).await,
        Command::Truncate(args) => cli::truncate::run(&config, args).await,
        Command::CheckConfig => cli::check_config::run(&config),
    }
}
