//! Port interfaces for catalog loading and budget reconciliation

use std::collections::BTreeMap;

use async_trait::async_trait;
use costsync_domain::{
    AlertChannel, BudgetPeriod, CatalogSnapshot, Frequency, Result, Severity, SyncError, SyncKey,
    SyncState,
};
use serde::{Deserialize, Serialize};

/// Create-or-update request for one budget, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetUpsert {
    pub name: String,
    pub amount: u64,
    pub period: BudgetPeriod,
    pub cost_center: String,
    pub filter_labels: BTreeMap<String, String>,
}

/// Create-or-update request for one alert rule on an existing budget, keyed
/// by `(budget_name, rule_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRuleUpsert {
    pub budget_name: String,
    pub rule_name: String,
    pub threshold_pct: f64,
    pub severity: Severity,
    pub channels: Vec<AlertChannel>,
    pub frequency: Frequency,
}

/// External budgeting capability. Both calls must be idempotent.
#[async_trait]
pub trait BudgetingApi: Send + Sync {
    async fn upsert_budget(&self, request: &BudgetUpsert) -> std::result::Result<(), SyncError>;

    async fn upsert_alert_rule(
        &self,
        request: &AlertRuleUpsert,
    ) -> std::result::Result<(), SyncError>;
}

/// Trait for persisting sync state per key
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn get(&self, key: &SyncKey) -> Result<Option<SyncState>>;

    async fn put(&self, key: &SyncKey, state: &SyncState) -> Result<()>;

    async fn list(&self) -> Result<Vec<(SyncKey, SyncState)>>;
}

/// Supplies immutable catalog snapshots, one per resolution pass
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_snapshot(&self) -> Result<CatalogSnapshot>;
}
