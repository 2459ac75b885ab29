//! Sync outcomes and pass-level reporting

use std::collections::BTreeMap;

use costsync_domain::{Environment, SyncError, SyncKey};
use serde::Serialize;

/// External calls made during one sync request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepTally {
    pub budgets_upserted: u32,
    pub alert_rules_upserted: u32,
    pub budget_failures: u32,
    pub alert_rule_failures: u32,
}

impl StepTally {
    pub fn calls(&self) -> u32 {
        self.budgets_upserted + self.alert_rules_upserted + self.budget_failures + self.alert_rule_failures
    }

    pub fn merge(&mut self, other: StepTally) {
        self.budgets_upserted += other.budgets_upserted;
        self.alert_rules_upserted += other.alert_rules_upserted;
        self.budget_failures += other.budget_failures;
        self.alert_rule_failures += other.alert_rule_failures;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Stored hash matched with a successful status; no calls made.
    Unchanged,
    Synced { attempts: u32, tally: StepTally },
    /// Failure persisted, either terminal or after retries ran out.
    Failed { error: SyncError, attempts: u32, tally: StepTally },
    /// Abandoned at a step boundary in favour of a newer request.
    Superseded { tally: StepTally },
    /// Stopped at a step boundary because the pass ran out of time. Nothing
    /// is persisted; the next pass resumes from the completed steps.
    Cancelled { tally: StepTally },
}

impl SyncOutcome {
    pub fn tally(&self) -> StepTally {
        match self {
            Self::Unchanged => StepTally::default(),
            Self::Synced { tally, .. }
            | Self::Failed { tally, .. }
            | Self::Superseded { tally }
            | Self::Cancelled { tally } => *tally,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-environment counts of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentTotals {
    pub services: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<(SyncKey, SyncOutcome)>,
}

impl SyncReport {
    pub fn new(outcomes: Vec<(SyncKey, SyncOutcome)>) -> Self {
        Self { outcomes }
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn synced(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Synced { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(SyncOutcome::is_failure)
    }

    pub fn superseded(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Superseded { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Cancelled { .. }))
    }

    pub fn tally(&self) -> StepTally {
        let mut total = StepTally::default();
        for (_, outcome) in &self.outcomes {
            total.merge(outcome.tally());
        }
        total
    }

    /// Unchanged keys count as completed.
    pub fn per_environment(&self) -> BTreeMap<Environment, EnvironmentTotals> {
        let mut totals: BTreeMap<Environment, EnvironmentTotals> = BTreeMap::new();
        for (key, outcome) in &self.outcomes {
            let entry = totals.entry(key.environment).or_default();
            entry.services += 1;
            match outcome {
                SyncOutcome::Synced { .. } | SyncOutcome::Unchanged => entry.completed += 1,
                SyncOutcome::Failed { .. } => entry.failed += 1,
                SyncOutcome::Superseded { .. } | SyncOutcome::Cancelled { .. } => {}
            }
        }
        totals
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SyncKey, &SyncError)> {
        self.outcomes.iter().filter_map(|(key, outcome)| match outcome {
            SyncOutcome::Failed { error, .. } => Some((key, error)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_environment_totals() {
        let report = SyncReport::new(vec![
            (SyncKey::new("a", Environment::Prod), SyncOutcome::Unchanged),
            (
                SyncKey::new("b", Environment::Prod),
                SyncOutcome::Failed {
                    error: SyncError::Terminal("unknown cost center".into()),
                    attempts: 1,
                    tally: StepTally { budget_failures: 1, ..StepTally::default() },
                },
            ),
            (
                SyncKey::new("a", Environment::IntStable),
                SyncOutcome::Synced {
                    attempts: 1,
                    tally: StepTally { budgets_upserted: 1, alert_rules_upserted: 2, ..StepTally::default() },
                },
            ),
        ]);

        let totals = report.per_environment();
        assert_eq!(totals[&Environment::Prod], EnvironmentTotals { services: 2, completed: 1, failed: 1 });
        assert_eq!(totals[&Environment::IntStable].completed, 1);
        assert_eq!(report.tally().calls(), 4);
        assert_eq!(report.failures().count(), 1);
    }
}
