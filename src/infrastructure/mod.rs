//! Infrastructure layer - storage backends, credential services and use cases

pub mod account;
pub mod auth;
pub mod logging;
pub mod mailer;
pub mod refresh_token;
pub mod repositories;
pub mod session;
pub mod storage;
pub mod user;

pub use repositories::{RecordCounts, Repositories};
