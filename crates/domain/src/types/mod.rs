//! Domain types and models
//!
//! - [`environment`]: the closed set of deployment environments
//! - [`catalog`]: reusable cost profiles, the size table and per-service
//!   declarations, bundled into an immutable [`CatalogSnapshot`]
//! - [`resolved`]: fully expanded per-(service, environment) configuration
//! - [`sync_state`]: persisted reconciliation state per sync key

pub mod catalog;
pub mod environment;
pub mod resolved;
pub mod sync_state;

pub use catalog::{
    AlertChannel, AlertRuleTemplate, Allocation, CatalogSnapshot, ChannelKind, CostProfile,
    EnvironmentBudget, Frequency, OptimizationFlags, OverrideBlock, ProfileEnvironmentOverride,
    ServiceCostDeclaration, ServiceOverrides, Severity, SizeTable,
};
pub use environment::Environment;
pub use resolved::{
    BudgetPeriod, OverrideTier, ResolvedAlertRule, ResolvedAllocation, ResolvedCostConfiguration,
    SyncKey,
};
pub use sync_state::{SyncState, SyncStatus};
