//! Error types used throughout the application
//!
//! Three failure families are isolated per key and never abort a pass:
//! [`ConfigurationError`] (resolution), [`ValidationError`] (business rules)
//! and [`SyncError`] (reconciliation). [`CostSyncError`] is the top-level
//! error for infrastructure operations.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Environment, SyncKey};

/// Main error type for CostSync
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CostSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Resolution(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type alias for CostSync operations
pub type Result<T> = std::result::Result<T, CostSyncError>;

/// Raised while resolving one service. Blocks only that service.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationError {
    #[error("service '{service}' references unknown cost profile '{profile}'")]
    UnknownProfile { service: String, profile: String },

    #[error("service '{service}' uses unknown size '{size}'")]
    UnknownSize { service: String, size: String },

    #[error("cost profile '{profile}' defines no budget for {environment}")]
    UnknownEnvironment { profile: String, environment: Environment },

    #[error("unresolved placeholder '{{{variable}}}' in {field} of service '{service}'")]
    MissingVariable { service: String, variable: String, field: String },

    #[error("service '{service}' is missing allocation field '{field}'")]
    MissingAllocationField { service: String, field: String },

    #[error("service '{service}' has invalid {tier} multiplier {value}")]
    InvalidMultiplier { service: String, tier: String, value: f64 },

    #[error("resolution of service '{service}' aborted: {reason}")]
    ResolutionAborted { service: String, reason: String },
}

impl ConfigurationError {
    /// Service the error blocks.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::UnknownProfile { service, .. }
            | Self::UnknownSize { service, .. }
            | Self::MissingVariable { service, .. }
            | Self::MissingAllocationField { service, .. }
            | Self::InvalidMultiplier { service, .. }
            | Self::ResolutionAborted { service, .. } => Some(service),
            Self::UnknownEnvironment { .. } => None,
        }
    }
}

/// One violated business rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ValidationViolation {
    BudgetOutOfRange { amount: u64, min: u64, max: u64 },
    TooFewAlertRules { count: usize, min: usize },
    NoCriticalAlert,
    ThresholdOutOfRange { rule: String, threshold_pct: f64 },
    InvalidCostCenter { value: String },
    InvalidEmail { field: String, value: String },
    EmptyChannels { rule: String },
    /// Two rules render to the same name and would share one remote alert.
    DuplicateAlertRule { rule: String },
    MissingAccountingLabel { label: String },
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetOutOfRange { amount, min, max } => {
                write!(f, "budget {amount} outside [{min}, {max}]")
            }
            Self::TooFewAlertRules { count, min } => {
                write!(f, "{count} alert rule(s), at least {min} required")
            }
            Self::NoCriticalAlert => f.write_str("no critical alert rule"),
            Self::ThresholdOutOfRange { rule, threshold_pct } => {
                write!(f, "alert '{rule}' threshold {threshold_pct}% outside [50, 110]")
            }
            Self::InvalidCostCenter { value } => write!(f, "invalid cost center '{value}'"),
            Self::InvalidEmail { field, value } => write!(f, "invalid email '{value}' in {field}"),
            Self::EmptyChannels { rule } => write!(f, "alert '{rule}' has no channels"),
            Self::DuplicateAlertRule { rule } => write!(f, "alert name '{rule}' is used twice"),
            Self::MissingAccountingLabel { label } => {
                write!(f, "missing accounting label '{label}'")
            }
        }
    }
}

/// Every rule violated by one resolved configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{key} failed validation: {}", join_violations(.violations))]
pub struct ValidationError {
    pub key: SyncKey,
    pub violations: Vec<ValidationViolation>,
}

fn join_violations(violations: &[ValidationViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Failure talking to the budgeting system or persisting sync state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SyncError {
    /// Server error, throttling or connection failure. Retried.
    #[error("transient budgeting failure: {0}")]
    Transient(String),

    /// Deterministic rejection, e.g. an unknown cost center. Not retried.
    #[error("budgeting request rejected: {0}")]
    Terminal(String),

    /// Throttled by the budgeting system. Retried no sooner than
    /// `retry_after_ms` when the server sent one.
    #[error("budgeting API throttled the request: {message}")]
    RateLimited { message: String, retry_after_ms: Option<u64> },

    #[error("budgeting call timed out after {0}ms")]
    Timeout(u64),

    #[error("sync state persistence failed: {0}")]
    Persistence(String),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. } | Self::Timeout(_))
    }

    /// Earliest retry the server asked for.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_ms: Some(ms), .. } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = ValidationError {
            key: SyncKey::new("checkout", Environment::Prod),
            violations: vec![
                ValidationViolation::NoCriticalAlert,
                ValidationViolation::InvalidCostCenter { value: "CC-1".into() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("checkout/prod failed validation"));
        assert!(msg.contains("no critical alert rule; invalid cost center 'CC-1'"));
    }

    #[test]
    fn missing_variable_message_shows_braces() {
        let err = ConfigurationError::MissingVariable {
            service: "checkout".into(),
            variable: "unknownVar".into(),
            field: "alert 'budget' name".into(),
        };
        assert!(err.to_string().contains("'{unknownVar}'"));
        assert_eq!(err.service(), Some("checkout"));
    }

    #[test]
    fn only_transient_and_timeout_are_retryable() {
        assert!(SyncError::Transient("503".into()).is_transient());
        assert!(SyncError::Timeout(30_000).is_transient());
        assert!(!SyncError::Terminal("unknown cost center".into()).is_transient());
        assert!(!SyncError::Persistence("disk full".into()).is_transient());
    }

    #[test]
    fn throttling_carries_the_server_delay() {
        let throttled =
            SyncError::RateLimited { message: "429".into(), retry_after_ms: Some(3_000) };
        assert!(throttled.is_transient());
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(SyncError::Transient("503".into()).retry_after(), None);
    }

    #[test]
    fn errors_convert_into_top_level() {
        let err: CostSyncError = SyncError::Terminal("nope".into()).into();
        assert!(matches!(err, CostSyncError::Sync(SyncError::Terminal(_))));
    }
}
