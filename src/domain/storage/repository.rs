//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::context::Context;
use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Generic storage for one entity family with its secondary indexes
///
/// Every mutation updates the primary record and all index entries as one
/// unit: readers observe either the state before or after a `save`/`delete`.
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity,
{
    /// Short backend name used in operation tags
    fn backend_name(&self) -> &'static str;

    /// Retrieves an entity by its key
    async fn get(&self, ctx: &Context, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Checks if an entity exists by its key
    async fn exists(&self, ctx: &Context, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(ctx, key).await?.is_some())
    }

    /// Validates and writes an entity with its index entries, replacing any previous version
    async fn save(&self, ctx: &Context, entity: E) -> Result<E, DomainError>;

    /// Deletes an entity and its index entries, returns true if it existed
    async fn delete(&self, ctx: &Context, key: &E::Key) -> Result<bool, DomainError>;

    /// Entities whose key starts with `prefix`, ordered by key, strictly after `after`
    async fn scan(
        &self,
        ctx: &Context,
        prefix: &str,
        after: &str,
        limit: usize,
    ) -> Result<Vec<E>, DomainError>;

    /// Looks up an entity through a unique index
    async fn find_by_index(
        &self,
        ctx: &Context,
        index: &str,
        key: &str,
    ) -> Result<Option<E>, DomainError>;

    /// Checks a unique index for a key
    async fn exists_in_index(
        &self,
        ctx: &Context,
        index: &str,
        key: &str,
    ) -> Result<bool, DomainError> {
        Ok(self.find_by_index(ctx, index, key).await?.is_some())
    }

    /// Entities referenced by a non-unique index group, ordered by primary key,
    /// strictly after the primary key `after`
    async fn scan_index(
        &self,
        ctx: &Context,
        index: &str,
        group: &str,
        after: &str,
        limit: usize,
    ) -> Result<Vec<E>, DomainError>;

    /// Returns the count of entities
    async fn count(&self, ctx: &Context) -> Result<u64, DomainError>;

    /// Removes every entity and index entry of the family
    async fn clear(&self, ctx: &Context) -> Result<(), DomainError>;
}

/// Lower bound for a prefix scan resuming after a cursor
pub(crate) fn scan_start<'a>(prefix: &'a str, after: &'a str) -> &'a str {
    if after.is_empty() || after < prefix {
        prefix
    } else {
        after
    }
}
