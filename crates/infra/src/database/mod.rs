//! Database implementations

pub mod manager;
pub mod memory_repository;
pub mod sync_state_repository;

pub use manager::{DbConnection, DbManager};
pub use memory_repository::InMemorySyncStateRepository;
pub use sync_state_repository::SqliteSyncStateRepository;
