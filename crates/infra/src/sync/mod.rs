//! Budgeting API adapter
//!
//! `HttpBudgetingClient` implements the core `BudgetingApi` port over HTTP.

pub mod budgeting_client;
pub mod errors;

pub use budgeting_client::{HttpBudgetingClient, HttpBudgetingClientConfig};
pub use errors::BudgetApiError;
