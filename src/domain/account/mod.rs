//! Account domain

mod entity;
mod repository;

pub use entity::{Account, AccountKey, ProviderType};
pub use repository::AccountRepository;
