//! # CostSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The resolver turning sparse declarations into resolved configurations
//! - The validator gating resolved configurations before sync
//! - The sync engine reconciling resolved state into a budgeting system
//! - Port interfaces (traits) for the catalog, budgeting API and sync state
//!
//! ## Architecture Principles
//! - Only depends on `costsync-common` and `costsync-domain`
//! - No database, HTTP, or filesystem code
//! - All external dependencies via traits

pub mod reconcile;
pub mod resolver;
pub mod sync;
pub mod validation;

// Re-export specific items to avoid ambiguity
pub use reconcile::{PassReport, ReconcileService, ResolvedConfigStore, ResolvedEntry, ResolvedSnapshot};
pub use resolver::{resolve_catalog, ResolutionOutcome, Resolver};
pub use sync::ports::{
    AlertRuleUpsert, BudgetUpsert, BudgetingApi, CatalogSource, SyncStateRepository,
};
pub use sync::{SyncEngine, SyncEngineConfig, SyncOutcome, SyncPhase, SyncReport};
pub use validation::Validator;
