//! Full reconcile passes: catalog snapshot in, synced budgets out

pub mod service;
pub mod store;

pub use service::{PassReport, ReconcileService};
pub use store::{ResolvedConfigStore, ResolvedEntry, ResolvedSnapshot};
