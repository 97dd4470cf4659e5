//! Storage domain - Generic storage abstraction layer

mod entity;
mod repository;

pub use entity::{IndexEntry, StorageEntity, StorageKey};
pub(crate) use repository::scan_start;
pub use repository::Storage;
