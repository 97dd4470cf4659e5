//! Account infrastructure module

mod repository;
mod service;

pub use repository::StorageAccountRepository;
pub use service::AccountService;
