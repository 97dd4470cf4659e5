//! Storage infrastructure - Storage implementations

mod codec;
mod factory;
mod json_mutex;
mod keys;
mod kv;
mod snapshot;

#[cfg(test)]
mod conformance;

pub use factory::{StorageBackend, StorageConfig, StorageFactory, StorageType, DATABASE_FILE};
pub use json_mutex::JsonMutexStorage;
pub use keys::Keyspace;
pub use kv::{in_memory_database, open_database, RedbStorage};
pub use snapshot::{FileSnapshotStore, SnapshotStore, VolatileSnapshotStore};
