//! Override precedence as an ordered list of resolution strategies
//!
//! Each strategy looks at one override tier and either hands back a complete
//! replacement or falls through to the next one. Nothing is merged across
//! tiers.

use costsync_domain::{
    AlertRuleTemplate, CostProfile, Environment, OptimizationFlags, OverrideTier,
    ServiceCostDeclaration,
};

/// Strategies in the order they are consulted, most specific first.
pub const PRECEDENCE: [OverrideTier; 4] = [
    OverrideTier::EnvOverride,
    OverrideTier::ServiceOverride,
    OverrideTier::ProfileEnvOverride,
    OverrideTier::ProfileDefault,
];

/// Result of consulting one strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a, T> {
    Replace(&'a T),
    FallThrough,
}

/// What each tier offers for one resolvable facet (alert list or
/// optimization flags). Only the profile default is mandatory.
#[derive(Debug, Clone, Copy)]
pub struct TierCandidates<'a, T> {
    pub env_override: Option<&'a T>,
    pub service_override: Option<&'a T>,
    pub profile_env_override: Option<&'a T>,
    pub profile_default: &'a T,
}

impl<'a, T> TierCandidates<'a, T> {
    /// Applies a single strategy.
    pub fn apply(&self, strategy: OverrideTier) -> Resolution<'a, T> {
        let candidate = match strategy {
            OverrideTier::EnvOverride => self.env_override,
            OverrideTier::ServiceOverride => self.service_override,
            OverrideTier::ProfileEnvOverride => self.profile_env_override,
            OverrideTier::ProfileDefault => Some(self.profile_default),
        };
        candidate.map_or(Resolution::FallThrough, Resolution::Replace)
    }

    /// Walks `strategies` in order and returns the first replacement.
    /// Falls back to the profile default if every strategy falls through.
    pub fn select_with(&self, strategies: &[OverrideTier]) -> (OverrideTier, &'a T) {
        strategies
            .iter()
            .find_map(|&strategy| match self.apply(strategy) {
                Resolution::Replace(value) => Some((strategy, value)),
                Resolution::FallThrough => None,
            })
            .unwrap_or((OverrideTier::ProfileDefault, self.profile_default))
    }

    pub fn select(&self) -> (OverrideTier, &'a T) {
        self.select_with(&PRECEDENCE)
    }
}

pub fn alert_candidates<'a>(
    declaration: &'a ServiceCostDeclaration,
    profile: &'a CostProfile,
    environment: Environment,
) -> TierCandidates<'a, Vec<AlertRuleTemplate>> {
    TierCandidates {
        env_override: declaration
            .environment_override(environment)
            .and_then(|block| block.alerts.as_ref()),
        service_override: declaration.service_override().and_then(|block| block.alerts.as_ref()),
        profile_env_override: profile
            .environment_override(environment)
            .and_then(|block| block.alerts.as_ref()),
        profile_default: &profile.alerts,
    }
}

pub fn optimization_candidates<'a>(
    declaration: &'a ServiceCostDeclaration,
    profile: &'a CostProfile,
    environment: Environment,
) -> TierCandidates<'a, OptimizationFlags> {
    TierCandidates {
        env_override: declaration
            .environment_override(environment)
            .and_then(|block| block.optimization.as_ref()),
        service_override: declaration
            .service_override()
            .and_then(|block| block.optimization.as_ref()),
        profile_env_override: profile
            .environment_override(environment)
            .and_then(|block| block.optimization.as_ref()),
        profile_default: &profile.optimization,
    }
}
