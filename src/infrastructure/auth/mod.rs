//! Access token services

mod jwt;

pub use jwt::{AccessClaims, JwksTokenService, JwtConfig, TokenService};
