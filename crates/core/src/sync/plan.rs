//! Ordered upsert plan for one resolved configuration

use costsync_domain::ResolvedCostConfiguration;

use crate::sync::ports::{AlertRuleUpsert, BudgetUpsert};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStep {
    Budget(BudgetUpsert),
    AlertRule(AlertRuleUpsert),
}

impl SyncStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Budget(_) => "budget",
            Self::AlertRule(_) => "alert_rule",
        }
    }
}

/// Budget first, then every alert rule in resolved order. Rules reference
/// the budget by name, so the budget must exist before them.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    steps: Vec<SyncStep>,
}

impl SyncPlan {
    pub fn for_config(config: &ResolvedCostConfiguration) -> Self {
        let budget_name = config.budget_name();
        let budget = SyncStep::Budget(BudgetUpsert {
            name: budget_name.clone(),
            amount: config.monthly_budget,
            period: config.period,
            cost_center: config.allocation.cost_center.clone(),
            filter_labels: config.labels.clone(),
        });

        let rules = config.alert_rules.iter().map(|rule| {
            SyncStep::AlertRule(AlertRuleUpsert {
                budget_name: budget_name.clone(),
                rule_name: rule.name.clone(),
                threshold_pct: rule.threshold_pct,
                severity: rule.severity,
                channels: rule.channels.clone(),
                frequency: rule.frequency,
            })
        });

        Self { steps: std::iter::once(budget).chain(rules).collect() }
    }

    /// Steps in push order; the budget always comes first.
    pub fn steps(&self) -> &[SyncStep] {
        &self.steps
    }

    /// One budget step plus one step per alert rule.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
