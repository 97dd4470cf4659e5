//! Application configuration

mod app_config;

pub use app_config::{AppConfig, DatabaseConfig, HashersConfig, MailerConfig};
