//! Storage entity traits and types

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

/// Trait for types that can be used as storage keys
pub trait StorageKey: Clone + Debug + Send + Sync + Eq + std::hash::Hash {
    /// Returns the key as a string for storage backends that require string keys
    fn as_str(&self) -> &str;
}

/// A secondary index entry derived from an entity
///
/// Unique entries map `key` to exactly one primary key. Non-unique entries
/// embed the primary key as the last `/` segment of `key` and carry no
/// projection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Index name, e.g. `identifier` or `user_id`
    pub index: &'static str,
    /// Index key within that index
    pub key: String,
    /// Whether two primary keys may share the same index key
    pub unique: bool,
    /// Minimal projection stored alongside the entry by key-value backends
    pub projection: Value,
}

impl IndexEntry {
    /// Creates a unique index entry with a projection of the fields needed by the lookup
    pub fn unique(index: &'static str, key: impl Into<String>, projection: Value) -> Self {
        Self {
            index,
            key: key.into(),
            unique: true,
            projection,
        }
    }

    /// Creates a non-unique entry `{group}/{primary_key}` with an empty value
    pub fn grouped(index: &'static str, group: &str, primary_key: &str) -> Self {
        Self {
            index,
            key: format!("{}/{}", group, primary_key),
            unique: false,
            projection: Value::Null,
        }
    }

    /// Primary key referenced by a non-unique entry key
    pub fn grouped_primary_key(key: &str) -> &str {
        key.rsplit('/').next().unwrap_or(key)
    }
}

/// Trait for types that can be stored
pub trait StorageEntity:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The key type for this entity
    type Key: StorageKey;

    /// Plural family name used in key prefixes and snapshot file names
    const FAMILY: &'static str;

    /// Field holding the primary key inside unique index projections
    const KEY_FIELD: &'static str;

    /// Returns the entity's key
    fn key(&self) -> Self::Key;

    /// Checks structural constraints before anything is written
    fn validate(&self) -> Result<(), DomainError>;

    /// Secondary index entries for the current state of the entity
    fn index_entries(&self) -> Vec<IndexEntry> {
        Vec::new()
    }

    /// Stamps timestamps right before a save
    fn prepare_save(&mut self, _now: DateTime<Utc>) {}

    /// Rejects illegal replacements of a stored record
    fn check_replace(&self, _previous: &Self) -> Result<(), DomainError> {
        Ok(())
    }
}
