//! Sign up, sign in and token refresh

mod service;

pub use service::{AccessTokenResponse, SessionConfig, SessionService};
