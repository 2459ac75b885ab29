//! Resolved configuration types
//!
//! A [`ResolvedCostConfiguration`] is recomputed on every resolution pass and
//! is never the source of truth; it exists to be validated, inspected and
//! pushed to the budgeting system.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;
use crate::types::{AlertChannel, Environment, Frequency, OptimizationFlags, Severity};

/// `(service, environment)` pair that serializes writes to the budgeting
/// system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncKey {
    pub service: String,
    pub environment: Environment,
}

impl SyncKey {
    pub fn new(service: impl Into<String>, environment: Environment) -> Self {
        Self { service: service.into(), environment }
    }

    /// Deterministic budget name, `{service}-{environment}`.
    pub fn budget_name(&self) -> String {
        format!("{}-{}", self.service, self.environment)
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.environment)
    }
}

/// Override tier, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideTier {
    /// The service's environment-specific override.
    EnvOverride,
    /// The service-wide override.
    ServiceOverride,
    /// The profile's per-environment override.
    ProfileEnvOverride,
    /// The profile's defaults.
    ProfileDefault,
}

impl_domain_status_conversions!(OverrideTier {
    EnvOverride => "env_override",
    ServiceOverride => "service_override",
    ProfileEnvOverride => "profile_env_override",
    ProfileDefault => "profile_default",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BudgetPeriod {
    #[default]
    Monthly,
}

impl_domain_status_conversions!(BudgetPeriod {
    Monthly => "monthly",
});

/// Alert rule with every placeholder substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAlertRule {
    pub name: String,
    pub threshold_pct: f64,
    pub severity: Severity,
    pub channels: Vec<AlertChannel>,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAllocation {
    pub cost_center: String,
    pub business_unit: String,
    pub cost_owner: String,
}

/// Fully expanded cost configuration for one service in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCostConfiguration {
    pub key: SyncKey,
    pub profile: String,
    /// Whole currency units, a multiple of 50.
    pub monthly_budget: u64,
    pub raw_budget: f64,
    pub effective_multiplier: f64,
    pub period: BudgetPeriod,
    pub alert_rules: Vec<ResolvedAlertRule>,
    pub alert_source: OverrideTier,
    pub allocation: ResolvedAllocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub optimization: OptimizationFlags,
    pub optimization_source: OverrideTier,
    /// Accounting labels, also sent as the budget's filter labels.
    pub labels: BTreeMap<String, String>,
}

impl ResolvedCostConfiguration {
    pub fn budget_name(&self) -> String {
        self.key.budget_name()
    }

    pub fn has_critical_rule(&self) -> bool {
        self.alert_rules.iter().any(|rule| rule.severity == Severity::Critical)
    }
}
