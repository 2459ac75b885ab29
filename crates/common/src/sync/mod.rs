//! Synchronization helpers shared by reconciliation workers.

pub mod retry;
