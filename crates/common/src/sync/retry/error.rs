// Error types for retry module
use thiserror::Error;

use crate::error::{CommonError, ErrorSeverity};
use crate::impl_error_classification;

/// Errors that can occur while building or running a retry strategy
#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("All retry attempts exhausted after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

impl_error_classification!(RetryError, Common,
    Self::AttemptsExhausted { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

/// Result type for retry operations
pub type RetryResult<T> = Result<T, RetryError>;
