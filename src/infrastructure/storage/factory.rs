//! Storage factory for runtime backend selection

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use redb::Database;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::json_mutex::JsonMutexStorage;
use super::keys::Keyspace;
use super::kv::{self, RedbStorage};
use super::snapshot::{FileSnapshotStore, SnapshotStore, VolatileSnapshotStore};

/// File name of the key-value database inside its data directory
pub const DATABASE_FILE: &str = "authzy.redb";

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Lock-guarded in-memory maps with optional JSON snapshots
    JsonMutexDb,
    /// Ordered key-value store
    LevelDb,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonmutexdb" | "memory" | "inmemory" | "in-memory" => Ok(Self::JsonMutexDb),
            "leveldb" | "redb" | "kv" => Ok(Self::LevelDb),
            other => Err(DomainError::configuration(format!(
                "Unknown database type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JsonMutexDb => write!(f, "jsonmutexdb"),
            Self::LevelDb => write!(f, "leveldb"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    /// In-memory maps; snapshots go to `data_dir` when set
    JsonMutexDb {
        data_dir: Option<PathBuf>,
        filename_prefix: String,
    },
    /// Key-value database file inside `data_dir`
    LevelDb { data_dir: PathBuf, key_prefix: String },
    /// Key-value database kept only in memory
    LevelDbInMemory { key_prefix: String },
}

impl StorageConfig {
    /// Memory-only storage
    pub fn in_memory() -> Self {
        Self::JsonMutexDb {
            data_dir: None,
            filename_prefix: String::new(),
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::JsonMutexDb { .. } => StorageType::JsonMutexDb,
            Self::LevelDb { .. } | Self::LevelDbInMemory { .. } => StorageType::LevelDb,
        }
    }
}

/// Opened resources shared by every repository of one process
#[derive(Clone)]
pub enum StorageBackend {
    JsonMutexDb(Arc<dyn SnapshotStore>),
    LevelDb { db: Arc<Database>, keys: Keyspace },
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JsonMutexDb(snapshots) => f.debug_tuple("JsonMutexDb").field(snapshots).finish(),
            Self::LevelDb { keys, .. } => f.debug_struct("LevelDb").field("keys", keys).finish(),
        }
    }
}

impl StorageBackend {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::JsonMutexDb(_) => StorageType::JsonMutexDb,
            Self::LevelDb { .. } => StorageType::LevelDb,
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Opens the backend resources described by the configuration
    pub async fn open(config: &StorageConfig) -> Result<StorageBackend, DomainError> {
        match config {
            StorageConfig::JsonMutexDb {
                data_dir: Some(data_dir),
                filename_prefix,
            } => {
                let store = FileSnapshotStore::open(data_dir, filename_prefix.clone()).await?;
                tracing::info!(data_dir = %data_dir.display(), "Using jsonmutexdb with snapshots");
                Ok(StorageBackend::JsonMutexDb(Arc::new(store)))
            }
            StorageConfig::JsonMutexDb { data_dir: None, .. } => {
                tracing::info!("Using memory-only jsonmutexdb");
                Ok(StorageBackend::JsonMutexDb(Arc::new(VolatileSnapshotStore)))
            }
            StorageConfig::LevelDb {
                data_dir,
                key_prefix,
            } => {
                tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
                    DomainError::backend("leveldb.open", data_dir.display().to_string(), e)
                })?;

                let path = data_dir.join(DATABASE_FILE);
                let db = tokio::task::spawn_blocking(move || kv::open_database(path))
                    .await
                    .map_err(|e| DomainError::backend("leveldb.open", DATABASE_FILE, e))??;

                tracing::info!(data_dir = %data_dir.display(), "Using leveldb");
                Ok(StorageBackend::LevelDb {
                    db,
                    keys: Keyspace::new(key_prefix.clone()),
                })
            }
            StorageConfig::LevelDbInMemory { key_prefix } => Ok(StorageBackend::LevelDb {
                db: kv::in_memory_database()?,
                keys: Keyspace::new(key_prefix.clone()),
            }),
        }
    }

    /// Creates the storage of one entity family on an opened backend
    pub async fn create<E>(backend: &StorageBackend) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity,
    {
        match backend {
            StorageBackend::JsonMutexDb(snapshots) => {
                let storage = JsonMutexStorage::<E>::open(Arc::clone(snapshots)).await?;
                Ok(Arc::new(storage))
            }
            StorageBackend::LevelDb { db, keys } => {
                let storage = RedbStorage::<E>::open(Arc::clone(db), keys.clone())?;
                Ok(Arc::new(storage))
            }
        }
    }

    /// Creates a memory-only storage
    pub fn create_in_memory<E>() -> Arc<JsonMutexStorage<E>>
    where
        E: StorageEntity,
    {
        Arc::new(JsonMutexStorage::new())
    }
}
