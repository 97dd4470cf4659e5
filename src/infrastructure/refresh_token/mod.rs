//! Refresh token infrastructure module

mod repository;
mod service;

pub use repository::StorageRefreshTokenRepository;
pub use service::RefreshTokenService;
