//! Observability: logging setup and sync metrics
//!
//! ## Design Principles
//!
//! 1. **Poison Recovery**: metric mutexes recover the inner data and log a
//!    warning instead of panicking.
//!
//! 2. **Result Returns**: record methods return `MetricsResult<()>` so limits
//!    can reject samples without crashing callers. Callers log and continue.

pub mod metrics;

use costsync_domain::{CostSyncError, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

pub use metrics::SyncMetrics;

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData { metric: &'static str },

    /// Label cardinality limit exceeded; the sample was dropped.
    #[error("Label cardinality exceeded for metric '{metric}': {count} > {limit}")]
    CardinalityExceeded { metric: String, count: usize, limit: usize },
}

/// Result type for metrics operations
pub type MetricsResult<T> = std::result::Result<T, MetricsError>;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Calling this twice
/// keeps the first subscriber.
///
/// # Errors
/// Returns [`CostSyncError::Config`] when the level is not a valid filter
/// directive.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::try_from_default_env()
            .map_err(|e| CostSyncError::Config(format!("Invalid RUST_LOG '{value}': {e}"))),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            CostSyncError::Config(format!("Invalid log filter '{}': {e}", config.level))
        }),
    }?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json { builder.json().try_init() } else { builder.try_init() };

    if let Err(e) = installed {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_a_config_error() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig { level: "costsync=loud[".into(), json: false };
        assert!(matches!(init_logging(&config), Err(CostSyncError::Config(_))));
    }

    #[test]
    fn repeated_init_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&LoggingConfig { json: true, ..config }).is_ok());
    }
}
