//! Domain constants
//!
//! Centralized location for domain-level constants shared by the resolver,
//! validator and sync engine.

// Budget arithmetic
pub const BUDGET_ROUNDING_STEP: u64 = 50;
pub const CENTS_PER_UNIT: i64 = 100;

// Alert rule invariants
pub const MIN_ALERT_RULES: usize = 2;
pub const MIN_THRESHOLD_PCT: f64 = 50.0;
pub const MAX_THRESHOLD_PCT: f64 = 110.0;

/// Cost centers are `CC-` followed by five digits.
pub const COST_CENTER_PATTERN: &str = r"^CC-\d{5}$";

// Accounting labels attached to every resolved configuration
pub const LABEL_SERVICE: &str = "cost.service";
pub const LABEL_TEAM: &str = "cost.team";
pub const LABEL_ENVIRONMENT: &str = "cost.environment";
pub const LABEL_COST_CENTER: &str = "cost.costCenter";
pub const LABEL_BUSINESS_UNIT: &str = "cost.businessUnit";
pub const LABEL_PROFILE: &str = "cost.profile";

/// Labels that must be present and non-empty on every resolved configuration.
pub const REQUIRED_ACCOUNTING_LABELS: [&str; 4] =
    [LABEL_SERVICE, LABEL_ENVIRONMENT, LABEL_COST_CENTER, LABEL_BUSINESS_UNIT];

// Sync defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PASS_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_SYNC_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_SYNC_MAX_DELAY_MS: u64 = 30_000;
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 512;
