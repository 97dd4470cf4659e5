//! Domain layer - Core entities, repository contracts and errors

pub mod account;
pub mod context;
pub mod error;
pub mod pagination;
pub mod refresh_token;
pub mod storage;
pub mod user;

pub use account::{Account, AccountKey, AccountRepository, ProviderType};
pub use context::{ensure_active, Context};
pub use error::DomainError;
pub use pagination::{page_limit, Page, DEFAULT_PAGE_LIMIT};
pub use refresh_token::{RefreshToken, RefreshTokenId, RefreshTokenRepository};
pub use storage::{IndexEntry, Storage, StorageEntity, StorageKey};
pub use user::{User, UserId, UserRepository, VerificationKind};
