//! # CostSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Configuration loading (TOML/JSON files, `.env`, environment overrides)
//! - The directory-backed catalog source
//! - SQLite sync state persistence (r2d2 pool)
//! - The HTTP budgeting API client
//! - The reconcile pass scheduler
//! - Logging setup and sync metrics
//!
//! ## Architecture
//! - Implements traits defined in `costsync-core`
//! - Depends on `costsync-common`, `costsync-domain` and `costsync-core`
//! - Contains all "impure" code (I/O, network, background tasks)

pub mod catalog;
pub mod config;
pub mod context;
pub mod database;
pub mod errors;
pub mod observability;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use catalog::FileCatalogSource;
pub use context::CostSyncContext;
pub use database::{DbManager, InMemorySyncStateRepository, SqliteSyncStateRepository};
pub use errors::InfraError;
pub use observability::{init_logging, SyncMetrics};
pub use scheduling::{SchedulerError, SchedulerHandle, SyncScheduler, SyncSchedulerConfig};
pub use sync::{BudgetApiError, HttpBudgetingClient, HttpBudgetingClientConfig};
