//! In-memory storage guarded by one lock, with optional JSON snapshots
//!
//! The primary map is the only persisted state. Secondary indexes are rebuilt
//! from it on open, so a crash can never leave them out of step.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::context::{ensure_active, Context};
use crate::domain::storage::{scan_start, IndexEntry, Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

use super::codec::{decode, encode};
use super::snapshot::{SnapshotStore, VolatileSnapshotStore};

const BACKEND: &str = "jsonmutexdb";

/// Primary map and every index map of one family
#[derive(Debug)]
struct Tables<E> {
    records: BTreeMap<String, E>,
    indexes: HashMap<&'static str, BTreeMap<String, String>>,
}

impl<E: StorageEntity> Tables<E> {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            indexes: HashMap::new(),
        }
    }

    fn from_records(records: BTreeMap<String, E>) -> Self {
        let mut tables = Self::new();

        for (key, entity) in &records {
            for entry in entity.index_entries() {
                tables.add_entry(entry, key);
            }
        }

        tables.records = records;
        tables
    }

    fn add_entry(&mut self, entry: IndexEntry, key: &str) {
        self.indexes
            .entry(entry.index)
            .or_default()
            .insert(entry.key, key.to_string());
    }

    fn remove_entries(&mut self, entity: &E, key: &str) {
        for entry in entity.index_entries() {
            if let Some(index) = self.indexes.get_mut(entry.index) {
                if index.get(&entry.key).is_some_and(|owner| owner == key) {
                    index.remove(&entry.key);
                }
            }
        }
    }

    fn owner(&self, index: &str, key: &str) -> Option<&String> {
        self.indexes.get(index).and_then(|entries| entries.get(key))
    }

    /// Fails if a unique entry already belongs to another record
    fn check_unique(&self, key: &str, entries: &[IndexEntry]) -> Result<(), DomainError> {
        for entry in entries.iter().filter(|e| e.unique) {
            if let Some(owner) = self.owner(entry.index, &entry.key) {
                if owner != key {
                    return Err(DomainError::already_exists(format!(
                        "{} '{}' is already in use",
                        entry.index, entry.key
                    )));
                }
            }
        }

        Ok(())
    }

    /// Writes a record and its entries, dropping entries of the replaced version
    fn put(&mut self, key: String, entity: E) -> Option<E> {
        let previous = self.records.remove(&key);

        if let Some(previous) = &previous {
            self.remove_entries(previous, &key);
        }

        for entry in entity.index_entries() {
            self.add_entry(entry, &key);
        }

        self.records.insert(key, entity);
        previous
    }

    fn take(&mut self, key: &str) -> Option<E> {
        let removed = self.records.remove(key)?;
        self.remove_entries(&removed, key);
        Some(removed)
    }

    /// Undoes a `put` or `take`
    fn restore(&mut self, key: &str, previous: Option<E>) {
        self.take(key);

        if let Some(previous) = previous {
            self.put(key.to_string(), previous);
        }
    }
}

/// Thread-safe in-memory storage for one entity family
///
/// Every mutation is one critical section covering the primary map, the
/// index maps and the snapshot write. A failed snapshot write rolls the
/// mutation back.
#[derive(Debug)]
pub struct JsonMutexStorage<E>
where
    E: StorageEntity,
{
    tables: RwLock<Tables<E>>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl<E> Default for JsonMutexStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> JsonMutexStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new empty storage without persistence
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            snapshots: Arc::new(VolatileSnapshotStore),
        }
    }

    /// Loads the family snapshot, if any, and rebuilds the indexes
    pub async fn open(snapshots: Arc<dyn SnapshotStore>) -> Result<Self, DomainError> {
        let records = match snapshots.load(E::FAMILY).await? {
            Some(contents) => decode::<BTreeMap<String, E>>(
                &Self::operation("load"),
                E::FAMILY,
                &contents,
            )?,
            None => BTreeMap::new(),
        };

        tracing::debug!(family = E::FAMILY, records = records.len(), "Snapshot loaded");

        Ok(Self {
            tables: RwLock::new(Tables::from_records(records)),
            snapshots,
        })
    }

    fn operation(name: &str) -> String {
        format!("{}/{}.{}", E::FAMILY, BACKEND, name)
    }

    async fn commit(&self, tables: &Tables<E>) -> Result<(), DomainError> {
        let contents = encode(&Self::operation("commit"), E::FAMILY, &tables.records)?;
        self.snapshots.store(E::FAMILY, contents).await
    }
}

#[async_trait]
impl<E> Storage<E> for JsonMutexStorage<E>
where
    E: StorageEntity,
{
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, ctx: &Context, key: &E::Key) -> Result<Option<E>, DomainError> {
        ensure_active(ctx)?;
        let tables = self.tables.read().await;

        Ok(tables.records.get(key.as_str()).cloned())
    }

    async fn save(&self, ctx: &Context, entity: E) -> Result<E, DomainError> {
        ensure_active(ctx)?;

        let mut entity = entity;
        entity.prepare_save(Utc::now());
        entity.validate()?;

        let key = entity.key().as_str().to_string();
        let mut tables = self.tables.write().await;

        if let Some(previous) = tables.records.get(&key) {
            entity.check_replace(previous)?;
        }
        tables.check_unique(&key, &entity.index_entries())?;

        let previous = tables.put(key.clone(), entity.clone());

        if let Err(e) = self.commit(&tables).await {
            tables.restore(&key, previous);
            return Err(e);
        }

        Ok(entity)
    }

    async fn delete(&self, ctx: &Context, key: &E::Key) -> Result<bool, DomainError> {
        ensure_active(ctx)?;
        let mut tables = self.tables.write().await;

        let Some(removed) = tables.take(key.as_str()) else {
            return Ok(false);
        };

        if let Err(e) = self.commit(&tables).await {
            tables.restore(key.as_str(), Some(removed));
            return Err(e);
        }

        Ok(true)
    }

    async fn scan(
        &self,
        ctx: &Context,
        prefix: &str,
        after: &str,
        limit: usize,
    ) -> Result<Vec<E>, DomainError> {
        ensure_active(ctx)?;
        let tables = self.tables.read().await;
        let start = scan_start(prefix, after);

        Ok(tables
            .records
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .filter(|(key, _)| key.as_str() != after)
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit)
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    async fn find_by_index(
        &self,
        ctx: &Context,
        index: &str,
        key: &str,
    ) -> Result<Option<E>, DomainError> {
        ensure_active(ctx)?;
        let tables = self.tables.read().await;

        Ok(tables
            .owner(index, key)
            .and_then(|owner| tables.records.get(owner))
            .cloned())
    }

    async fn scan_index(
        &self,
        ctx: &Context,
        index: &str,
        group: &str,
        after: &str,
        limit: usize,
    ) -> Result<Vec<E>, DomainError> {
        ensure_active(ctx)?;
        let tables = self.tables.read().await;

        let Some(entries) = tables.indexes.get(index) else {
            return Ok(Vec::new());
        };

        let prefix = format!("{}/", group);
        let cursor = if after.is_empty() {
            String::new()
        } else {
            format!("{}{}", prefix, after)
        };

        Ok(entries
            .range::<str, _>((Bound::Included(scan_start(&prefix, &cursor)), Bound::Unbounded))
            .filter(|(key, _)| **key != cursor)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(_, owner)| tables.records.get(owner).cloned())
            .take(limit)
            .collect())
    }

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError> {
        ensure_active(ctx)?;
        let tables = self.tables.read().await;

        Ok(tables.records.len() as u64)
    }

    async fn clear(&self, ctx: &Context) -> Result<(), DomainError> {
        ensure_active(ctx)?;
        let mut tables = self.tables.write().await;

        let previous = std::mem::replace(&mut *tables, Tables::new());

        if let Err(e) = self.commit(&tables).await {
            *tables = previous;
            return Err(e);
        }

        Ok(())
    }
}
