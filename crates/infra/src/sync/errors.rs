//! Budgeting API error types

use costsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use costsync_common::impl_error_classification;
use costsync_domain::{CostSyncError, SyncError};
use thiserror::Error;

/// Failure of one budgeting API call.
#[derive(Debug, Error)]
pub enum BudgetApiError {
    /// Timeouts and throttling.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// 408 or 5xx.
    #[error("{endpoint} unavailable: HTTP {status}: {body}")]
    Unavailable { endpoint: String, status: u16, body: String },

    /// Any other non-success status; the request itself is wrong.
    #[error("{endpoint} rejected request: HTTP {status}: {body}")]
    Rejected { endpoint: String, status: u16, body: String },

    /// No response: connection refused, reset, DNS.
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("invalid budgeting URL: {0}")]
    InvalidUrl(String),
}

impl_error_classification!(BudgetApiError, Common,
    Self::Unavailable { .. } | Self::Transport { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Rejected { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::InvalidUrl(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
);

impl BudgetApiError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(endpoint: &str, status: u16, body: String) -> Self {
        let endpoint = endpoint.to_string();
        if status == 408 || (500..=599).contains(&status) {
            Self::Unavailable { endpoint, status, body }
        } else {
            Self::Rejected { endpoint, status, body }
        }
    }
}

impl From<BudgetApiError> for SyncError {
    fn from(err: BudgetApiError) -> Self {
        match &err {
            BudgetApiError::Common(CommonError::Timeout { duration, .. }) => {
                Self::Timeout(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
            }
            BudgetApiError::Common(CommonError::RateLimitExceeded { retry_after }) => {
                Self::RateLimited {
                    message: err.to_string(),
                    retry_after_ms: retry_after
                        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                }
            }
            _ if err.is_retryable() => Self::Transient(err.to_string()),
            _ => Self::Terminal(err.to_string()),
        }
    }
}

impl From<BudgetApiError> for CostSyncError {
    fn from(err: BudgetApiError) -> Self {
        match err {
            BudgetApiError::InvalidUrl(msg) => Self::Config(format!("invalid budgeting URL: {msg}")),
            BudgetApiError::Common(CommonError::Config { message, .. }) => Self::Config(message),
            other => Self::Network(other.to_string()),
        }
    }
}
