//! Business-rule validation of resolved configurations
//!
//! Every check runs independently; a configuration comes back with all of
//! its violations, never just the first one.

use std::collections::BTreeSet;

use costsync_common::validation::{EmailValidator, FieldValidator, RangeValidator, StringValidator};
use costsync_domain::constants::{MAX_THRESHOLD_PCT, MIN_THRESHOLD_PCT, REQUIRED_ACCOUNTING_LABELS};
use costsync_domain::{
    ChannelKind, CostSyncError, ResolvedCostConfiguration, Result, ValidationConfig,
    ValidationError, ValidationViolation,
};

/// Gate between resolution and sync. Never mutates its input.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
    cost_center: StringValidator,
    threshold: RangeValidator<f64>,
    email: EmailValidator,
    label: StringValidator,
}

impl Validator {
    /// # Errors
    /// [`CostSyncError::Config`] when the cost-center pattern does not
    /// compile.
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let cost_center = StringValidator::new()
            .trim(false)
            .pattern(&config.cost_center_pattern)
            .map_err(|e| CostSyncError::Config(format!("Invalid cost center pattern: {e}")))?;

        Ok(Self {
            config,
            cost_center,
            threshold: RangeValidator::new(MIN_THRESHOLD_PCT, MAX_THRESHOLD_PCT),
            email: EmailValidator::new(),
            label: StringValidator::new().not_empty(),
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// # Errors
    /// A [`ValidationError`] listing every violated rule.
    pub fn validate(&self, resolved: &ResolvedCostConfiguration) -> std::result::Result<(), ValidationError> {
        let violations = self.violations(resolved);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { key: resolved.key.clone(), violations })
        }
    }

    pub fn violations(&self, resolved: &ResolvedCostConfiguration) -> Vec<ValidationViolation> {
        let mut violations = Vec::new();

        let bounds = self.config.bounds_for(resolved.key.environment);
        if !bounds.contains(resolved.monthly_budget) {
            violations.push(ValidationViolation::BudgetOutOfRange {
                amount: resolved.monthly_budget,
                min: bounds.min,
                max: bounds.max,
            });
        }

        let count = resolved.alert_rules.len();
        if !RangeValidator::empty().min(self.config.min_alert_rules).is_valid(&count) {
            violations.push(ValidationViolation::TooFewAlertRules {
                count,
                min: self.config.min_alert_rules,
            });
        }

        if !resolved.has_critical_rule() {
            violations.push(ValidationViolation::NoCriticalAlert);
        }

        let mut names = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for rule in &resolved.alert_rules {
            if !names.insert(rule.name.as_str()) && duplicates.insert(rule.name.as_str()) {
                violations.push(ValidationViolation::DuplicateAlertRule { rule: rule.name.clone() });
            }
            if !self.threshold.is_valid(&rule.threshold_pct) {
                violations.push(ValidationViolation::ThresholdOutOfRange {
                    rule: rule.name.clone(),
                    threshold_pct: rule.threshold_pct,
                });
            }
            if rule.channels.is_empty() {
                violations.push(ValidationViolation::EmptyChannels { rule: rule.name.clone() });
            }
            for channel in rule.channels.iter().filter(|c| c.kind == ChannelKind::Email) {
                if !self.email.is_valid(&channel.target) {
                    violations.push(ValidationViolation::InvalidEmail {
                        field: format!("alert '{}' email channel", rule.name),
                        value: channel.target.clone(),
                    });
                }
            }
        }

        let allocation = &resolved.allocation;
        if !self.cost_center.is_valid(&allocation.cost_center) {
            violations.push(ValidationViolation::InvalidCostCenter {
                value: allocation.cost_center.clone(),
            });
        }
        if !self.email.is_valid(&allocation.cost_owner) {
            violations.push(ValidationViolation::InvalidEmail {
                field: "allocation.costOwner".to_string(),
                value: allocation.cost_owner.clone(),
            });
        }

        for label in REQUIRED_ACCOUNTING_LABELS {
            let present = resolved.labels.get(label).is_some_and(|v| self.label.is_valid(v));
            if !present {
                violations.push(ValidationViolation::MissingAccountingLabel {
                    label: label.to_string(),
                });
            }
        }

        violations
    }
}
