//! Application configuration structures
//!
//! Every section has serde defaults so a partial file, or no file at all,
//! yields a usable configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COST_CENTER_PATTERN, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_PASS_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SYNC_BASE_DELAY_MS, DEFAULT_SYNC_MAX_ATTEMPTS,
    DEFAULT_SYNC_MAX_DELAY_MS, MIN_ALERT_RULES,
};
use crate::impl_domain_status_conversions;
use crate::types::Environment;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub budgeting: BudgetingConfig,
    pub sync: SyncConfig,
    pub database: DatabaseConfig,
    pub resolution: ResolutionConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

/// Where catalog documents are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub root: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("catalog") }
    }
}

/// External budgeting API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetingConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BudgetingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            api_token: None,
            request_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Upper bound for each individual budgeting call.
    pub call_timeout_secs: u64,
    /// Deadline for a whole reconcile pass. Past it, keys stop at their next
    /// step boundary.
    pub pass_timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            pass_timeout_secs: DEFAULT_PASS_TIMEOUT_SECS,
            max_attempts: DEFAULT_SYNC_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_SYNC_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_SYNC_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "costsync.db".to_string(), pool_size: 4 }
    }
}

/// How raw budgets are snapped to the 50-unit grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Any remainder moves up to the next multiple of 50.
    #[default]
    Ceiling,
    /// Nearest multiple of 50, exact midpoints move up.
    NearestHalfUp,
}

impl_domain_status_conversions!(RoundingPolicy {
    Ceiling => "ceiling",
    NearestHalfUp => "nearest_half_up",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub rounding: RoundingPolicy,
}

/// Inclusive budget range for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetBounds {
    pub min: u64,
    pub max: u64,
}

impl BudgetBounds {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, amount: u64) -> bool {
        amount >= self.min && amount <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub bounds: BTreeMap<Environment, BudgetBounds>,
    pub min_alert_rules: usize,
    pub cost_center_pattern: String,
}

impl ValidationConfig {
    /// Bounds for `environment`, falling back to the defaults when the
    /// configuration leaves it out.
    pub fn bounds_for(&self, environment: Environment) -> BudgetBounds {
        self.bounds.get(&environment).copied().unwrap_or_else(|| default_bounds(environment))
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bounds: Environment::ALL.into_iter().map(|env| (env, default_bounds(env))).collect(),
            min_alert_rules: MIN_ALERT_RULES,
            cost_center_pattern: COST_CENTER_PATTERN.to_string(),
        }
    }
}

/// Tightest at the lowest tier, widest in production.
pub const fn default_bounds(environment: Environment) -> BudgetBounds {
    match environment {
        Environment::IntStable => BudgetBounds::new(100, 10_000),
        Environment::PreStable => BudgetBounds::new(100, 50_000),
        Environment::Prod => BudgetBounds::new(500, 500_000),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `costsync_core=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
