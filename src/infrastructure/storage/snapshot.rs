//! Whole-family snapshot persistence for the in-memory backend

use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::DomainError;

use super::keys::Keyspace;

/// Loads and stores the serialized primary map of one entity family
#[async_trait]
pub trait SnapshotStore: Send + Sync + Debug {
    /// Returns the stored snapshot, or `None` if the family was never stored
    async fn load(&self, family: &str) -> Result<Option<Vec<u8>>, DomainError>;

    /// Replaces the stored snapshot
    async fn store(&self, family: &str, contents: Vec<u8>) -> Result<(), DomainError>;
}

/// Keeps nothing; state lives only in memory
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatileSnapshotStore;

#[async_trait]
impl SnapshotStore for VolatileSnapshotStore {
    async fn load(&self, _family: &str) -> Result<Option<Vec<u8>>, DomainError> {
        Ok(None)
    }

    async fn store(&self, _family: &str, _contents: Vec<u8>) -> Result<(), DomainError> {
        Ok(())
    }
}

/// One JSON file per family, `{data_dir}/{filename_prefix}{family}.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    data_dir: PathBuf,
    keys: Keyspace,
}

impl FileSnapshotStore {
    /// Opens a store in `data_dir`, creating the directory if needed
    pub async fn open(
        data_dir: impl AsRef<Path>,
        filename_prefix: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let data_dir = data_dir.as_ref().to_path_buf();

        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            DomainError::backend("jsonmutexdb.open", data_dir.display().to_string(), e)
        })?;

        Ok(Self {
            data_dir,
            keys: Keyspace::new(filename_prefix),
        })
    }

    pub fn path_for(&self, family: &str) -> PathBuf {
        self.data_dir.join(self.keys.snapshot_file(family))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, family: &str) -> Result<Option<Vec<u8>>, DomainError> {
        let path = self.path_for(family);

        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::backend(
                format!("{}/jsonmutexdb.load", family),
                path.display().to_string(),
                e,
            )),
        }
    }

    async fn store(&self, family: &str, contents: Vec<u8>) -> Result<(), DomainError> {
        let path = self.path_for(family);
        let staging = path.with_extension("json.tmp");
        let operation = format!("{}/jsonmutexdb.commit", family);

        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| DomainError::backend(&operation, staging.display().to_string(), e))?;

        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| DomainError::backend(&operation, path.display().to_string(), e))?;

        tracing::debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }
}
