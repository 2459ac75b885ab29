//! Catalog types: cost profiles, size table and service declarations
//!
//! These are the read-only inputs of a resolution pass. Declarations are
//! sparse; anything a service does not override is taken from its profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CostSyncError, Result};
use crate::impl_domain_status_conversions;
use crate::types::Environment;

/* -------------------------------------------------------------------------- */
/* Alert templates */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl_domain_status_conversions!(Severity {
    Info => "info",
    Warning => "warning",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Immediate,
}

impl_domain_status_conversions!(Frequency {
    Once => "once",
    Daily => "daily",
    Immediate => "immediate",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Team,
    Email,
    Pager,
}

impl_domain_status_conversions!(ChannelKind {
    Team => "team",
    Email => "email",
    Pager => "pager",
});

/// Notification target. `target` may contain `{placeholder}` tokens until
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertChannel {
    pub kind: ChannelKind,
    pub target: String,
}

impl AlertChannel {
    pub fn new(kind: ChannelKind, target: impl Into<String>) -> Self {
        Self { kind, target: target.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRuleTemplate {
    pub name: String,
    pub threshold_pct: f64,
    pub severity: Severity,
    #[serde(default)]
    pub channels: Vec<AlertChannel>,
    pub frequency: Frequency,
}

/* -------------------------------------------------------------------------- */
/* Profiles */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentBudget {
    pub base: f64,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
}

fn default_scaling_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationFlags {
    pub auto_scaling: bool,
    pub spot_instances: bool,
    pub scheduled_shutdown: bool,
    pub rightsizing: bool,
}

/// A profile's per-environment replacement for its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileEnvironmentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<AlertRuleTemplate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationFlags>,
}

/// Reusable cost template shared by many services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub budgets: BTreeMap<Environment, EnvironmentBudget>,
    #[serde(default)]
    pub alerts: Vec<AlertRuleTemplate>,
    #[serde(default)]
    pub environment_overrides: BTreeMap<Environment, ProfileEnvironmentOverride>,
    #[serde(default)]
    pub optimization: OptimizationFlags,
}

impl CostProfile {
    pub fn budget_for(&self, environment: Environment) -> Option<&EnvironmentBudget> {
        self.budgets.get(&environment)
    }

    pub fn environment_override(
        &self,
        environment: Environment,
    ) -> Option<&ProfileEnvironmentOverride> {
        self.environment_overrides.get(&environment)
    }
}

/// Size tag to dimensionless budget multiplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeTable(BTreeMap<String, f64>);

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, multiplier: f64) -> Option<f64> {
        self.0.insert(tag.into(), multiplier)
    }

    pub fn multiplier(&self, tag: &str) -> Option<f64> {
        self.0.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for SizeTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(tag, m)| (tag.into(), m)).collect())
    }
}

/* -------------------------------------------------------------------------- */
/* Service declarations */
/* -------------------------------------------------------------------------- */

/// Accounting fields owned by the service. Kept optional at parse time so a
/// missing field is reported by the resolver with the service name attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allocation {
    pub cost_center: Option<String>,
    pub business_unit: Option<String>,
    pub cost_owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<AlertRuleTemplate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationFlags>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<OverrideBlock>,
    pub environment: BTreeMap<Environment, OverrideBlock>,
}

/// Sparse per-service cost declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCostDeclaration {
    pub service: String,
    pub profile: String,
    pub size: String,
    #[serde(default)]
    pub allocation: Allocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Environments to resolve. Empty means every environment.
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub overrides: ServiceOverrides,
}

impl ServiceCostDeclaration {
    /// Environments this service resolves for, lowest tier first, without
    /// duplicates.
    pub fn target_environments(&self) -> Vec<Environment> {
        if self.environments.is_empty() {
            return Environment::ALL.to_vec();
        }
        let mut envs = self.environments.clone();
        envs.sort();
        envs.dedup();
        envs
    }

    pub fn service_override(&self) -> Option<&OverrideBlock> {
        self.overrides.service.as_ref()
    }

    pub fn environment_override(&self, environment: Environment) -> Option<&OverrideBlock> {
        self.overrides.environment.get(&environment)
    }
}

/* -------------------------------------------------------------------------- */
/* Snapshot */
/* -------------------------------------------------------------------------- */

/// Immutable view of the catalog handed to one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CostProfile>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceCostDeclaration>,
    #[serde(default)]
    pub sizes: SizeTable,
}

impl CatalogSnapshot {
    pub fn new(sizes: SizeTable) -> Self {
        Self { sizes, ..Self::default() }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a profile, rejecting a second profile with the same name.
    ///
    /// # Errors
    /// Returns [`CostSyncError::Catalog`] on a duplicate name.
    pub fn add_profile(&mut self, profile: CostProfile) -> Result<()> {
        if self.profiles.contains_key(&profile.name) {
            return Err(CostSyncError::Catalog(format!(
                "duplicate cost profile '{}'",
                profile.name
            )));
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Adds a service declaration, rejecting duplicates.
    ///
    /// # Errors
    /// Returns [`CostSyncError::Catalog`] on a duplicate service name.
    pub fn add_service(&mut self, declaration: ServiceCostDeclaration) -> Result<()> {
        if self.services.contains_key(&declaration.service) {
            return Err(CostSyncError::Catalog(format!(
                "duplicate service declaration '{}'",
                declaration.service
            )));
        }
        self.services.insert(declaration.service.clone(), declaration);
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&CostProfile> {
        self.profiles.get(name)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceCostDeclaration> {
        self.services.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(environments: Vec<Environment>) -> ServiceCostDeclaration {
        ServiceCostDeclaration {
            service: "checkout".into(),
            profile: "web".into(),
            size: "m".into(),
            allocation: Allocation::default(),
            team: None,
            environments,
            overrides: ServiceOverrides::default(),
        }
    }

    #[test]
    fn empty_environment_list_means_all() {
        assert_eq!(declaration(vec![]).target_environments(), Environment::ALL.to_vec());
    }

    #[test]
    fn explicit_environments_are_sorted_and_deduplicated() {
        let decl =
            declaration(vec![Environment::Prod, Environment::IntStable, Environment::Prod]);
        assert_eq!(decl.target_environments(), vec![Environment::IntStable, Environment::Prod]);
    }

    #[test]
    fn duplicate_service_is_rejected() {
        let mut snapshot = CatalogSnapshot::default();
        snapshot.add_service(declaration(vec![])).unwrap();
        let err = snapshot.add_service(declaration(vec![])).unwrap_err();
        assert!(matches!(err, CostSyncError::Catalog(msg) if msg.contains("checkout")));
    }

    #[test]
    fn profile_parses_from_toml_with_defaults() {
        let doc = r##"
            name = "web"

            [budgets.prod]
            base = 3000.0
            scaling_factor = 2.0

            [budgets.int-stable]
            base = 200.0

            [[alerts]]
            name = "warn-{service}"
            threshold_pct = 80.0
            severity = "warning"
            frequency = "daily"
            channels = [{ kind = "team", target = "#team-{service}" }]
        "##;

        let profile: CostProfile = toml::from_str(doc).unwrap();
        assert_eq!(profile.budget_for(Environment::Prod).unwrap().scaling_factor, 2.0);
        assert_eq!(profile.budget_for(Environment::IntStable).unwrap().scaling_factor, 1.0);
        assert!(profile.budget_for(Environment::PreStable).is_none());
        assert_eq!(profile.alerts[0].channels[0].kind, ChannelKind::Team);
        assert_eq!(profile.optimization, OptimizationFlags::default());
    }

    #[test]
    fn size_table_is_a_plain_map_on_the_wire() {
        let table: SizeTable = serde_json::from_str(r#"{"s": 0.5, "m": 1.0}"#).unwrap();
        assert_eq!(table.multiplier("s"), Some(0.5));
        assert_eq!(table.multiplier("xl"), None);
        assert_eq!(table.len(), 2);
    }
}
