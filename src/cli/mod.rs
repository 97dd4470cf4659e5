//! CLI module for authzy
//!
//! Maintenance subcommands over the configured storage backend:
//! - `stats`: record counts per entity family
//! - `truncate`: delete every record
//! - `check-config`: validate configuration and JWT keys

pub mod check_config;
pub mod stats;
pub mod truncate;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;

/// authzy - identity storage and session engine
#[derive(Parser)]
#[command(name = "authzy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the number of stored records per entity family
    Stats,

    /// Delete every stored record
    Truncate(truncate::TruncateArgs),

    /// Validate configuration, hasher parameters and JWT keys
    CheckConfig,
}

/// Load `.env` and configuration, then install the log subscriber
pub fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    Ok(config)
}
