use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::auth::JwtConfig;
use crate::infrastructure::logging::LoggingConfig;
use crate::infrastructure::session::SessionConfig;
use crate::infrastructure::storage::{StorageConfig, StorageType};
use crate::infrastructure::user::Argon2Config;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub mailer: MailerConfig,
    pub hashers: HashersConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `jsonmutexdb` or `leveldb`
    #[serde(rename = "type")]
    pub backend: String,
    pub jsonmutexdb: JsonMutexDbConfig,
    pub leveldb: LevelDbConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonMutexDbConfig {
    /// Snapshot directory; empty keeps everything in memory
    pub data_dir: String,
    pub filename_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LevelDbConfig {
    pub data_dir: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// Minimum seconds between two verification mails of the same kind
    pub max_frequency: u64,
    pub autoconfirm: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HashersConfig {
    pub argon2: Argon2Config,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageType::JsonMutexDb.to_string(),
            jsonmutexdb: JsonMutexDbConfig::default(),
            leveldb: LevelDbConfig::default(),
        }
    }
}

impl Default for LevelDbConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            key_prefix: String::new(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            max_frequency: 300,
            autoconfirm: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Storage backend selected by `database.type`
    pub fn storage_config(&self) -> Result<StorageConfig, DomainError> {
        let database = &self.database;

        Ok(match database.backend.parse::<StorageType>()? {
            StorageType::JsonMutexDb => StorageConfig::JsonMutexDb {
                data_dir: Some(&database.jsonmutexdb.data_dir)
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from),
                filename_prefix: database.jsonmutexdb.filename_prefix.clone(),
            },
            StorageType::LevelDb => StorageConfig::LevelDb {
                data_dir: PathBuf::from(&database.leveldb.data_dir),
                key_prefix: database.leveldb.key_prefix.clone(),
            },
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            autoconfirm: self.mailer.autoconfirm,
            max_frequency: Duration::from_secs(self.mailer.max_frequency),
        }
    }
}
