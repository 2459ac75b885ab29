//! # CostSync Domain
//!
//! Business domain types and models for cost-configuration resolution and
//! budget reconciliation.
//!
//! This crate contains:
//! - Catalog types (cost profiles, size table, service declarations)
//! - Resolved configuration and sync-state types
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other CostSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
