//! Reconciliation of resolved configurations into the budgeting system

pub mod engine;
pub mod hash;
pub mod plan;
pub mod ports;
pub mod report;
pub mod state;

pub use engine::{SyncEngine, SyncEngineConfig};
pub use hash::content_hash;
pub use plan::{SyncPlan, SyncStep};
pub use report::{EnvironmentTotals, StepTally, SyncOutcome, SyncReport};
pub use state::{SyncEvent, SyncPhase};
