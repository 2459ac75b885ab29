// Retry module: capped exponential backoff with optional jitter

pub mod constants;
pub mod error;
pub mod strategy;

pub use error::{RetryError, RetryResult};
pub use strategy::RetryStrategy;
