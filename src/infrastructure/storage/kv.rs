//! Ordered key-value storage on redb
//!
//! All families share one byte-ordered table. Each save writes the record,
//! its index entries and the removal of obsolete entries in a single write
//! transaction, so a partial index update is never visible.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use crate::domain::context::{ensure_active, Context};
use crate::domain::storage::{scan_start, IndexEntry, Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

use super::codec::{decode, encode, projection_owner};
use super::keys::Keyspace;

const BACKEND: &str = "redb";

/// Every record and index entry lives in this table
const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// `count` checks for cancellation once per this many items
const COUNT_POLL_INTERVAL: u64 = 100;

trait TaggedResult<T> {
    fn tagged(self, operation: &str, key: &str) -> Result<T, DomainError>;
}

impl<T, Err> TaggedResult<T> for Result<T, Err>
where
    Err: Into<redb::Error>,
{
    fn tagged(self, operation: &str, key: &str) -> Result<T, DomainError> {
        self.map_err(|e| DomainError::backend(operation, key, Into::<redb::Error>::into(e)))
    }
}

/// Opens (or creates) the database file shared by all families
pub fn open_database(path: impl AsRef<std::path::Path>) -> Result<Arc<Database>, DomainError> {
    let path = path.as_ref();
    Database::create(path)
        .map(Arc::new)
        .tagged("redb.open", &path.display().to_string())
}

/// Creates a database that lives only in memory
pub fn in_memory_database() -> Result<Arc<Database>, DomainError> {
    Database::builder()
        .create_with_backend(redb::backends::InMemoryBackend::new())
        .map(Arc::new)
        .tagged("redb.open", ":memory:")
}

/// Storage for one entity family inside a shared redb database
pub struct RedbStorage<E> {
    db: Arc<Database>,
    keys: Keyspace,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Debug for RedbStorage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage")
            .field("family", &std::any::type_name::<E>())
            .field("keys", &self.keys)
            .finish()
    }
}

impl<E> RedbStorage<E>
where
    E: StorageEntity,
{
    /// Creates the storage and makes sure the shared table exists
    pub fn open(db: Arc<Database>, keys: Keyspace) -> Result<Self, DomainError> {
        let operation = operation::<E>("open");

        let txn = db.begin_write().tagged(&operation, keys.prefix())?;
        txn.open_table(ENTRIES).tagged(&operation, keys.prefix())?;
        txn.commit().tagged(&operation, keys.prefix())?;

        Ok(Self {
            db,
            keys,
            _entity: PhantomData,
        })
    }

    /// Runs a blocking database closure off the async executor
    async fn blocking<T, F>(&self, name: &str, f: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &Keyspace) -> Result<T, DomainError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let keys = self.keys.clone();

        tokio::task::spawn_blocking(move || f(&db, &keys))
            .await
            .map_err(|e| DomainError::backend(operation::<E>(name), E::FAMILY, e))?
    }
}

fn operation<E: StorageEntity>(name: &str) -> String {
    format!("{}/{}.{}", E::FAMILY, BACKEND, name)
}

fn read_record<E, T>(table: &T, operation: &str, key: &str) -> Result<Option<E>, DomainError>
where
    E: StorageEntity,
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match table.get(key.as_bytes()).tagged(operation, key)? {
        Some(value) => decode(operation, key, value.value()).map(Some),
        None => Ok(None),
    }
}

fn entry_key<E: StorageEntity>(keys: &Keyspace, entry: &IndexEntry) -> String {
    keys.index(E::FAMILY, entry.index, &entry.key)
}

fn save_entity<E: StorageEntity>(db: &Database, keys: &Keyspace, entity: E) -> Result<E, DomainError> {
    let operation = operation::<E>("save");
    let primary_key = entity.key().as_str().to_string();
    let record_key = keys.record(E::FAMILY, &primary_key);

    let txn = db.begin_write().tagged(&operation, &record_key)?;
    {
        let mut table = txn.open_table(ENTRIES).tagged(&operation, &record_key)?;

        let previous: Option<E> = read_record(&table, &operation, &record_key)?;
        if let Some(previous) = &previous {
            entity.check_replace(previous)?;
        }

        let entries = entity.index_entries();

        for entry in entries.iter().filter(|e| e.unique) {
            let index_key = entry_key::<E>(keys, entry);
            if let Some(value) = table.get(index_key.as_bytes()).tagged(&operation, &index_key)? {
                let owner = projection_owner(&operation, &index_key, value.value(), E::KEY_FIELD)?;
                if owner != primary_key {
                    return Err(DomainError::already_exists(format!(
                        "{} '{}' is already in use",
                        entry.index, entry.key
                    )));
                }
            }
        }

        if let Some(previous) = &previous {
            for stale in previous.index_entries() {
                let still_present = entries
                    .iter()
                    .any(|e| e.index == stale.index && e.key == stale.key);
                if !still_present {
                    let index_key = entry_key::<E>(keys, &stale);
                    table.remove(index_key.as_bytes()).tagged(&operation, &index_key)?;
                }
            }
        }

        let record = encode(&operation, &record_key, &entity)?;
        table
            .insert(record_key.as_bytes(), record.as_slice())
            .tagged(&operation, &record_key)?;

        for entry in &entries {
            let index_key = entry_key::<E>(keys, entry);
            let value = if entry.projection.is_null() {
                Vec::new()
            } else {
                encode(&operation, &index_key, &entry.projection)?
            };
            table
                .insert(index_key.as_bytes(), value.as_slice())
                .tagged(&operation, &index_key)?;
        }
    }
    txn.commit().tagged(&operation, &record_key)?;

    Ok(entity)
}

fn delete_entity<E: StorageEntity>(
    db: &Database,
    keys: &Keyspace,
    primary_key: &str,
) -> Result<bool, DomainError> {
    let operation = operation::<E>("delete");
    let record_key = keys.record(E::FAMILY, primary_key);

    let txn = db.begin_write().tagged(&operation, &record_key)?;
    {
        let mut table = txn.open_table(ENTRIES).tagged(&operation, &record_key)?;

        let Some(previous) = read_record::<E, _>(&table, &operation, &record_key)? else {
            return Ok(false);
        };

        for entry in previous.index_entries() {
            let index_key = entry_key::<E>(keys, &entry);
            table.remove(index_key.as_bytes()).tagged(&operation, &index_key)?;
        }
        table.remove(record_key.as_bytes()).tagged(&operation, &record_key)?;
    }
    txn.commit().tagged(&operation, &record_key)?;

    Ok(true)
}

fn clear_family<E: StorageEntity>(db: &Database, keys: &Keyspace) -> Result<(), DomainError> {
    let operation = operation::<E>("delete_all");
    let prefixes = [keys.records(E::FAMILY), keys.indexes(E::FAMILY)];

    let txn = db.begin_write().tagged(&operation, E::FAMILY)?;
    {
        let mut table = txn.open_table(ENTRIES).tagged(&operation, E::FAMILY)?;

        for prefix in &prefixes {
            let mut doomed: Vec<Vec<u8>> = Vec::new();

            for item in table.range(prefix.as_bytes()..).tagged(&operation, prefix)? {
                let (key, _) = item.tagged(&operation, prefix)?;
                if !key.value().starts_with(prefix.as_bytes()) {
                    break;
                }
                doomed.push(key.value().to_vec());
            }

            for key in &doomed {
                table.remove(key.as_slice()).tagged(&operation, prefix)?;
            }
        }
    }
    txn.commit().tagged(&operation, E::FAMILY)?;

    Ok(())
}

#[async_trait]
impl<E> Storage<E> for RedbStorage<E>
where
    E: StorageEntity,
{
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, ctx: &Context, key: &E::Key) -> Result<Option<E>, DomainError> {
        ensure_active(ctx)?;
        let primary_key = key.as_str().to_string();

        self.blocking("get", move |db, keys| {
            let operation = operation::<E>("get");
            let record_key = keys.record(E::FAMILY, &primary_key);

            let txn = db.begin_read().tagged(&operation, &record_key)?;
            let table = txn.open_table(ENTRIES).tagged(&operation, &record_key)?;
            read_record(&table, &operation, &record_key)
        })
        .await
    }

    async fn save(&self, ctx: &Context, entity: E) -> Result<E, DomainError> {
        ensure_active(ctx)?;

        let mut entity = entity;
        entity.prepare_save(Utc::now());
        entity.validate()?;

        self.blocking("save", move |db, keys| save_entity(db, keys, entity))
            .await
    }

    async fn delete(&self, ctx: &Context, key: &E::Key) -> Result<bool, DomainError> {
        ensure_active(ctx)?;
        let primary_key = key.as_str().to_string();

        self.blocking("delete", move |db, keys| {
            delete_entity::<E>(db, keys, &primary_key)
        })
        .await
    }

    async fn scan(
        &self,
        ctx: &Context,
        prefix: &str,
        after: &str,
        limit: usize,
    ) -> Result<Vec<E>, DomainError> {
        ensure_active(ctx)?;
        let prefix = prefix.to_string();
        let after = after.to_string();

        self.blocking("scan", move |db, keys| {
            let operation = operation::<E>("scan");
            let family = keys.records(E::FAMILY);
            let full_prefix = format!("{}{}", family, prefix);
            let start = format!("{}{}", family, scan_start(&prefix, &after));
            let cursor = format!("{}{}", family, after);

            let txn = db.begin_read().tagged(&operation, &start)?;
            let table = txn.open_table(ENTRIES).tagged(&operation, &start)?;

            let mut items = Vec::new();
            for item in table.range(start.as_bytes()..).tagged(&operation, &start)? {
                if items.len() >= limit {
                    break;
                }

                let (key, value) = item.tagged(&operation, &start)?;
                let key = key.value();
                if !key.starts_with(full_prefix.as_bytes()) {
                    break;
                }
                if !after.is_empty() && key == cursor.as_bytes() {
                    continue;
                }

                let key = String::from_utf8_lossy(key);
                items.push(decode(&operation, &key, value.value())?);
            }

            Ok(items)
        })
        .await
    }

    async fn find_by_index(
        &self,
        ctx: &Context,
        index: &str,
        key: &str,
    ) -> Result<Option<E>, DomainError> {
        ensure_active(ctx)?;
        let index = index.to_string();
        let key = key.to_string();

        self.blocking("find_by_index", move |db, keys| {
            let operation = operation::<E>("find_by_index");
            let index_key = keys.index(E::FAMILY, &index, &key);

            let txn = db.begin_read().tagged(&operation, &index_key)?;
            let table = txn.open_table(ENTRIES).tagged(&operation, &index_key)?;

            let owner = match table.get(index_key.as_bytes()).tagged(&operation, &index_key)? {
                Some(value) => projection_owner(&operation, &index_key, value.value(), E::KEY_FIELD)?,
                None => return Ok(None),
            };

            read_record(&table, &operation, &keys.record(E::FAMILY, &owner))
        })
        .await
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
        let index = index.to_string();
        let group = group.to_string();
        let after = after.to_string();

        self.blocking("scan_index", move |db, keys| {
            let operation = operation::<E>("scan_index");
            let prefix = format!("{}{}/", keys.index_prefix(E::FAMILY, &index), group);
            let cursor = format!("{}{}", prefix, after);

            let txn = db.begin_read().tagged(&operation, &prefix)?;
            let table = txn.open_table(ENTRIES).tagged(&operation, &prefix)?;

            let mut owners = Vec::new();
            for item in table.range(cursor.as_bytes()..).tagged(&operation, &prefix)? {
                if owners.len() >= limit {
                    break;
                }

                let (key, _) = item.tagged(&operation, &prefix)?;
                let key = key.value();
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                if !after.is_empty() && key == cursor.as_bytes() {
                    continue;
                }

                let key = String::from_utf8_lossy(key);
                owners.push(IndexEntry::grouped_primary_key(&key).to_string());
            }

            let mut items = Vec::with_capacity(owners.len());
            for owner in owners {
                if let Some(entity) = read_record(&table, &operation, &keys.record(E::FAMILY, &owner))? {
                    items.push(entity);
                }
            }

            Ok(items)
        })
        .await
    }

    async fn count(&self, ctx: &Context) -> Result<u64, DomainError> {
        ensure_active(ctx)?;
        let ctx = ctx.clone();

        self.blocking("count", move |db, keys| {
            let operation = operation::<E>("count");
            let prefix = keys.records(E::FAMILY);

            let txn = db.begin_read().tagged(&operation, &prefix)?;
            let table = txn.open_table(ENTRIES).tagged(&operation, &prefix)?;

            let mut count: u64 = 0;
            for item in table.range(prefix.as_bytes()..).tagged(&operation, &prefix)? {
                let (key, _) = item.tagged(&operation, &prefix)?;
                if !key.value().starts_with(prefix.as_bytes()) {
                    break;
                }

                count += 1;
                if count % COUNT_POLL_INTERVAL == 0 {
                    ensure_active(&ctx)?;
                }
            }

            Ok(count)
        })
        .await
    }

    async fn clear(&self, ctx: &Context) -> Result<(), DomainError> {
        ensure_active(ctx)?;

        self.blocking("delete_all", |db, keys| clear_family::<E>(db, keys))
            .await
    }
}
