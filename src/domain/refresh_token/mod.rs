//! Refresh token domain

mod entity;
mod repository;

pub use entity::{RefreshToken, RefreshTokenId, TOKEN_INDEX, USER_ID_INDEX};
pub use repository::RefreshTokenRepository;
