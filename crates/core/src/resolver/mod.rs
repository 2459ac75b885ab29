//! Resolution of sparse service declarations into resolved configurations
//!
//! [`Resolver::resolve`] is deterministic and does no I/O: identical inputs
//! always produce an identical [`ResolvedCostConfiguration`].

pub mod budget;
pub mod strategy;
pub mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

use costsync_domain::constants::{
    LABEL_BUSINESS_UNIT, LABEL_COST_CENTER, LABEL_ENVIRONMENT, LABEL_PROFILE, LABEL_SERVICE,
    LABEL_TEAM,
};
use costsync_domain::{
    BudgetPeriod, CatalogSnapshot, ConfigurationError, CostProfile, Environment,
    ResolutionConfig, ResolvedAllocation, ResolvedCostConfiguration, RoundingPolicy,
    ServiceCostDeclaration, SizeTable, SyncKey,
};
use futures::future::join_all;
use tokio::task::JoinError;
use tracing::{debug, error, instrument, warn};

use self::strategy::{alert_candidates, optimization_candidates};
use self::template::PlaceholderContext;

/// Resolution result for one (service, environment) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    /// The (service, environment) pair that was resolved.
    pub key: SyncKey,
    /// The configuration, or the error that blocks this key.
    pub result: Result<ResolvedCostConfiguration, ConfigurationError>,
}

/// Applies override precedence, budget arithmetic and template substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolver {
    rounding: RoundingPolicy,
}

impl Resolver {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self { rounding: config.rounding }
    }

    pub fn with_rounding(rounding: RoundingPolicy) -> Self {
        Self { rounding }
    }

    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    /// Resolves one declaration against its profile for `environment`.
    ///
    /// # Errors
    /// Any [`ConfigurationError`] other than `UnknownProfile`, which only
    /// [`Resolver::resolve_in`] can detect.
    pub fn resolve(
        &self,
        declaration: &ServiceCostDeclaration,
        profile: &CostProfile,
        sizes: &SizeTable,
        environment: Environment,
    ) -> Result<ResolvedCostConfiguration, ConfigurationError> {
        let service = declaration.service.as_str();

        let size_multiplier = sizes.multiplier(&declaration.size).ok_or_else(|| {
            ConfigurationError::UnknownSize {
                service: service.to_string(),
                size: declaration.size.clone(),
            }
        })?;

        let allocation = resolve_allocation(declaration)?;

        let env_budget = profile.budget_for(environment).ok_or_else(|| {
            ConfigurationError::UnknownEnvironment { profile: profile.name.clone(), environment }
        })?;

        let effective_multiplier = budget::effective_multiplier(
            service,
            size_multiplier,
            declaration.service_override().and_then(|block| block.budget_multiplier),
            declaration.environment_override(environment).and_then(|block| block.budget_multiplier),
        )?;
        let raw_budget = budget::raw_budget(service, env_budget, effective_multiplier)?;
        let monthly_budget = budget::round_budget(raw_budget, self.rounding);

        let (alert_source, templates) =
            alert_candidates(declaration, profile, environment).select();
        let context = PlaceholderContext { service, allocation: &allocation, environment };
        let alert_rules = templates
            .iter()
            .map(|template| context.render_rule(template))
            .collect::<Result<Vec<_>, _>>()?;

        let (optimization_source, optimization) =
            optimization_candidates(declaration, profile, environment).select();

        let key = SyncKey::new(service, environment);
        let labels = accounting_labels(&key, &profile.name, &allocation, declaration.team.as_deref());

        Ok(ResolvedCostConfiguration {
            key,
            profile: profile.name.clone(),
            monthly_budget,
            raw_budget,
            effective_multiplier,
            period: BudgetPeriod::Monthly,
            alert_rules,
            alert_source,
            allocation,
            team: declaration.team.clone(),
            optimization: *optimization,
            optimization_source,
            labels,
        })
    }

    /// Like [`Resolver::resolve`], looking the profile and size table up in
    /// `snapshot`.
    ///
    /// # Errors
    /// [`ConfigurationError::UnknownProfile`] plus everything `resolve`
    /// returns.
    pub fn resolve_in(
        &self,
        snapshot: &CatalogSnapshot,
        declaration: &ServiceCostDeclaration,
        environment: Environment,
    ) -> Result<ResolvedCostConfiguration, ConfigurationError> {
        let profile = snapshot.profile(&declaration.profile).ok_or_else(|| {
            ConfigurationError::UnknownProfile {
                service: declaration.service.clone(),
                profile: declaration.profile.clone(),
            }
        })?;
        self.resolve(declaration, profile, &snapshot.sizes, environment)
    }

    /// Resolves every target environment of one service.
    pub fn resolve_service(
        &self,
        snapshot: &CatalogSnapshot,
        declaration: &ServiceCostDeclaration,
    ) -> Vec<ResolutionOutcome> {
        declaration
            .target_environments()
            .into_iter()
            .map(|environment| {
                let result = self.resolve_in(snapshot, declaration, environment);
                if let Err(err) = &result {
                    debug!(service = %declaration.service, %environment, error = %err, "Resolution failed");
                }
                ResolutionOutcome { key: SyncKey::new(&declaration.service, environment), result }
            })
            .collect()
    }
}

/// Resolves every (service, environment) pair of the snapshot in parallel.
///
/// Each service runs on the blocking pool. Outcomes come back sorted by key,
/// and a failing service never affects the others: a task that panics turns
/// into [`ConfigurationError::ResolutionAborted`] for each of its keys.
#[instrument(skip_all, fields(services = snapshot.services.len()))]
pub async fn resolve_catalog(
    resolver: Resolver,
    snapshot: Arc<CatalogSnapshot>,
) -> Vec<ResolutionOutcome> {
    let names: Vec<String> = snapshot.services.keys().cloned().collect();
    let tasks = names.iter().cloned().map(|name| {
        let snapshot = Arc::clone(&snapshot);
        tokio::task::spawn_blocking(move || match snapshot.service(&name) {
            Some(declaration) => resolver.resolve_service(&snapshot, declaration),
            None => Vec::new(),
        })
    });

    let mut outcomes = Vec::new();
    for (name, joined) in names.iter().zip(join_all(tasks).await) {
        outcomes.extend(service_outcomes(&snapshot, name, joined));
    }

    outcomes.sort_by(|a, b| a.key.cmp(&b.key));
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some configurations could not be resolved");
    }
    outcomes
}

fn service_outcomes(
    snapshot: &CatalogSnapshot,
    service: &str,
    joined: Result<Vec<ResolutionOutcome>, JoinError>,
) -> Vec<ResolutionOutcome> {
    let err = match joined {
        Ok(batch) => return batch,
        Err(err) => err,
    };
    error!(service, error = %err, "Resolution task failed");

    let environments =
        snapshot.service(service).map(ServiceCostDeclaration::target_environments).unwrap_or_default();
    environments
        .into_iter()
        .map(|environment| ResolutionOutcome {
            key: SyncKey::new(service, environment),
            result: Err(ConfigurationError::ResolutionAborted {
                service: service.to_string(),
                reason: err.to_string(),
            }),
        })
        .collect()
}

fn resolve_allocation(
    declaration: &ServiceCostDeclaration,
) -> Result<ResolvedAllocation, ConfigurationError> {
    let field = |value: &Option<String>, name: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigurationError::MissingAllocationField {
                service: declaration.service.clone(),
                field: name.to_string(),
            })
    };

    let allocation = &declaration.allocation;
    Ok(ResolvedAllocation {
        cost_center: field(&allocation.cost_center, "costCenter")?,
        business_unit: field(&allocation.business_unit, "businessUnit")?,
        cost_owner: field(&allocation.cost_owner, "costOwner")?,
    })
}

fn accounting_labels(
    key: &SyncKey,
    profile: &str,
    allocation: &ResolvedAllocation,
    team: Option<&str>,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (LABEL_SERVICE.to_string(), key.service.clone()),
        (LABEL_ENVIRONMENT.to_string(), key.environment.to_string()),
        (LABEL_COST_CENTER.to_string(), allocation.cost_center.clone()),
        (LABEL_BUSINESS_UNIT.to_string(), allocation.business_unit.clone()),
        (LABEL_PROFILE.to_string(), profile.to_string()),
    ]);
    if let Some(team) = team.map(str::trim).filter(|t| !t.is_empty()) {
        labels.insert(LABEL_TEAM.to_string(), team.to_string());
    }
    labels
}

#[cfg(test)]
mod tests {
    use costsync_domain::{
        AlertChannel, AlertRuleTemplate, Allocation, ChannelKind, EnvironmentBudget, Frequency,
        OptimizationFlags, OverrideBlock, OverrideTier, ProfileEnvironmentOverride,
        ServiceOverrides, Severity,
    };

    use super::*;

    fn rule(name: &str, severity: Severity) -> AlertRuleTemplate {
        AlertRuleTemplate {
            name: name.to_string(),
            threshold_pct: 90.0,
            severity,
            channels: vec![AlertChannel::new(ChannelKind::Team, "#team-{service}")],
            frequency: Frequency::Daily,
        }
    }

    fn profile() -> CostProfile {
        CostProfile {
            name: "web".into(),
            description: None,
            budgets: BTreeMap::from([
                (Environment::Prod, EnvironmentBudget { base: 3000.0, scaling_factor: 2.0 }),
                (Environment::IntStable, EnvironmentBudget { base: 200.0, scaling_factor: 1.0 }),
            ]),
            alerts: vec![rule("default", Severity::Critical)],
            environment_overrides: BTreeMap::from([(
                Environment::Prod,
                ProfileEnvironmentOverride {
                    alerts: Some(vec![rule("profile-prod", Severity::Critical)]),
                    optimization: None,
                },
            )]),
            optimization: OptimizationFlags { rightsizing: true, ..OptimizationFlags::default() },
        }
    }

    fn declaration() -> ServiceCostDeclaration {
        ServiceCostDeclaration {
            service: "payment-processor".into(),
            profile: "web".into(),
            size: "m".into(),
            allocation: Allocation {
                cost_center: Some("CC-12345".into()),
                business_unit: Some("payments".into()),
                cost_owner: Some("owner@example.com".into()),
            },
            team: Some("payments-core".into()),
            environments: vec![],
            overrides: ServiceOverrides {
                service: Some(OverrideBlock {
                    budget_multiplier: Some(1.5),
                    alerts: Some(vec![rule("service", Severity::Critical)]),
                    optimization: Some(OptimizationFlags {
                        spot_instances: true,
                        ..OptimizationFlags::default()
                    }),
                }),
                environment: BTreeMap::from([(
                    Environment::Prod,
                    OverrideBlock {
                        budget_multiplier: None,
                        alerts: Some(vec![rule("env", Severity::Critical)]),
                        optimization: None,
                    },
                )]),
            },
        }
    }

    fn sizes() -> SizeTable {
        SizeTable::from_iter([("m", 1.2)])
    }

    #[test]
    fn budget_composes_size_and_service_override() {
        let resolved =
            Resolver::default().resolve(&declaration(), &profile(), &sizes(), Environment::Prod).unwrap();
        assert_eq!(resolved.monthly_budget, 10_800);
        assert!((resolved.effective_multiplier - 1.8).abs() < 1e-9);
    }

    #[test]
    fn optimization_follows_precedence() {
        let resolved =
            Resolver::default().resolve(&declaration(), &profile(), &sizes(), Environment::Prod).unwrap();
        assert_eq!(resolved.optimization_source, OverrideTier::ServiceOverride);
        assert!(resolved.optimization.spot_instances);
        assert!(!resolved.optimization.rightsizing);

        let mut decl = declaration();
        decl.overrides.service = None;
        let resolved =
            Resolver::default().resolve(&decl, &profile(), &sizes(), Environment::Prod).unwrap();
        assert_eq!(resolved.optimization_source, OverrideTier::ProfileDefault);
        assert!(resolved.optimization.rightsizing);
    }

    #[test]
    fn labels_carry_allocation_and_team() {
        let resolved = Resolver::default()
            .resolve(&declaration(), &profile(), &sizes(), Environment::IntStable)
            .unwrap();
        assert_eq!(resolved.labels[LABEL_SERVICE], "payment-processor");
        assert_eq!(resolved.labels[LABEL_ENVIRONMENT], "int-stable");
        assert_eq!(resolved.labels[LABEL_COST_CENTER], "CC-12345");
        assert_eq!(resolved.labels[LABEL_TEAM], "payments-core");
        assert_eq!(resolved.labels[LABEL_PROFILE], "web");
    }

    #[test]
    fn blank_allocation_field_is_missing() {
        let mut decl = declaration();
        decl.allocation.business_unit = Some("  ".into());
        let err = Resolver::default().resolve(&decl, &profile(), &sizes(), Environment::Prod).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingAllocationField {
                service: "payment-processor".into(),
                field: "businessUnit".into(),
            }
        );
    }

    #[test]
    fn missing_environment_budget_is_reported() {
        let err = Resolver::default()
            .resolve(&declaration(), &profile(), &sizes(), Environment::PreStable)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownEnvironment { environment: Environment::PreStable, .. }));
    }

    #[tokio::test]
    async fn panicked_task_marks_every_environment_unresolvable() {
        let mut snapshot = CatalogSnapshot::new(sizes());
        snapshot.add_service(declaration()).unwrap();
        let joined = tokio::task::spawn_blocking(|| -> Vec<ResolutionOutcome> {
            panic!("resolver bug")
        })
        .await;

        let outcomes = service_outcomes(&snapshot, "payment-processor", joined);

        let keys: Vec<_> = outcomes.iter().map(|o| o.key.environment).collect();
        assert_eq!(keys, declaration().target_environments());
        assert!(outcomes.iter().all(|o| matches!(
            &o.result,
            Err(ConfigurationError::ResolutionAborted { service, .. }) if service == "payment-processor"
        )));
    }

    #[test]
    fn snapshot_lookup_reports_unknown_profile() {
        let snapshot = CatalogSnapshot::new(sizes());
        let err = Resolver::default().resolve_in(&snapshot, &declaration(), Environment::Prod).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownProfile { ref profile, .. } if profile == "web"));
    }
}
