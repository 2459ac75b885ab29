//! Shared test helpers for `costsync-core` integration tests.
//!
//! Fixtures build a small catalog; the fakes record every budgeting call and
//! can be scripted to fail.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use costsync_common::time::MockClock;
use costsync_common::RetryStrategy;
use costsync_core::sync::ports::{
    AlertRuleUpsert, BudgetUpsert, BudgetingApi, CatalogSource, SyncStateRepository,
};
use costsync_core::{SyncEngine, SyncEngineConfig};
use costsync_domain::{
    AlertChannel, AlertRuleTemplate, Allocation, CatalogSnapshot, ChannelKind, CostProfile,
    Environment, EnvironmentBudget, Frequency, OptimizationFlags, Result, ServiceCostDeclaration,
    ServiceOverrides, Severity, SizeTable, SyncError, SyncKey, SyncState,
};
use parking_lot::Mutex;

/* -------------------------------------------------------------------------- */
/* Fixtures */
/* -------------------------------------------------------------------------- */

pub fn sizes() -> SizeTable {
    SizeTable::from_iter([("small", 0.5), ("medium", 1.0), ("large", 1.2)])
}

pub fn rule(name: &str, threshold_pct: f64, severity: Severity, target: &str) -> AlertRuleTemplate {
    AlertRuleTemplate {
        name: name.into(),
        threshold_pct,
        severity,
        channels: vec![AlertChannel::new(ChannelKind::Team, target)],
        frequency: Frequency::Daily,
    }
}

pub fn default_rules() -> Vec<AlertRuleTemplate> {
    vec![
        rule("{service}-warning", 80.0, Severity::Warning, "#team-{service}"),
        rule("{service}-critical", 100.0, Severity::Critical, "#team-{service}"),
    ]
}

pub fn web_profile() -> CostProfile {
    let budget = |base| EnvironmentBudget { base, scaling_factor: 1.0 };
    CostProfile {
        name: "web-service".into(),
        description: Some("Stateless HTTP services".into()),
        budgets: BTreeMap::from([
            (Environment::IntStable, budget(1000.0)),
            (Environment::PreStable, budget(2000.0)),
            (Environment::Prod, EnvironmentBudget { base: 3000.0, scaling_factor: 2.0 }),
        ]),
        alerts: default_rules(),
        environment_overrides: BTreeMap::new(),
        optimization: OptimizationFlags { auto_scaling: true, ..OptimizationFlags::default() },
    }
}

pub fn declaration(service: &str, size: &str) -> ServiceCostDeclaration {
    ServiceCostDeclaration {
        service: service.into(),
        profile: "web-service".into(),
        size: size.into(),
        allocation: Allocation {
            cost_center: Some("CC-12345".into()),
            business_unit: Some("payments".into()),
            cost_owner: Some("owner@example.com".into()),
        },
        team: Some("payments-platform".into()),
        environments: Vec::new(),
        overrides: ServiceOverrides::default(),
    }
}

pub fn snapshot(declarations: Vec<ServiceCostDeclaration>) -> CatalogSnapshot {
    let mut snapshot = CatalogSnapshot::new(sizes()).with_version("test-1");
    snapshot.add_profile(web_profile()).expect("profile should be unique");
    for declaration in declarations {
        snapshot.add_service(declaration).expect("service should be unique");
    }
    snapshot
}

/* -------------------------------------------------------------------------- */
/* Budgeting API fake */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Budget { name: String, amount: u64 },
    AlertRule { budget: String, rule: String },
}

/// Records every completed call. Scripted failures are consumed one per
/// call, in order; `None` entries let a call succeed.
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Option<SyncError>>>,
    always: Mutex<Option<SyncError>>,
    budget_delay: Mutex<Option<Duration>>,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Option<SyncError>>) {
        self.script.lock().extend(outcomes);
    }

    /// Budget upserts take `delay` before they are recorded.
    pub fn delay_budgets(&self, delay: Duration) {
        *self.budget_delay.lock() = Some(delay);
    }

    pub fn fail_always(&self, error: SyncError) {
        *self.always.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn budget_calls(&self) -> usize {
        self.calls.lock().iter().filter(|c| matches!(c, Call::Budget { .. })).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn next_outcome(&self, call: Call) -> std::result::Result<(), SyncError> {
        self.calls.lock().push(call);
        if let Some(error) = self.always.lock().clone() {
            return Err(error);
        }
        match self.script.lock().pop_front().flatten() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BudgetingApi for RecordingApi {
    async fn upsert_budget(&self, request: &BudgetUpsert) -> std::result::Result<(), SyncError> {
        let delay = *self.budget_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome(Call::Budget { name: request.name.clone(), amount: request.amount })
    }

    async fn upsert_alert_rule(
        &self,
        request: &AlertRuleUpsert,
    ) -> std::result::Result<(), SyncError> {
        self.next_outcome(Call::AlertRule {
            budget: request.budget_name.clone(),
            rule: request.rule_name.clone(),
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Sync state and catalog fakes */
/* -------------------------------------------------------------------------- */

#[derive(Default)]
pub struct MemoryStates {
    states: Mutex<BTreeMap<SyncKey, SyncState>>,
}

impl MemoryStates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self, key: &SyncKey) -> Option<SyncState> {
        self.states.lock().get(key).cloned()
    }
}

#[async_trait]
impl SyncStateRepository for MemoryStates {
    async fn get(&self, key: &SyncKey) -> Result<Option<SyncState>> {
        Ok(self.state(key))
    }

    async fn put(&self, key: &SyncKey, state: &SyncState) -> Result<()> {
        self.states.lock().insert(key.clone(), state.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(SyncKey, SyncState)>> {
        Ok(self.states.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

pub struct StaticCatalog(pub Mutex<CatalogSnapshot>);

impl StaticCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Arc<Self> {
        Arc::new(Self(Mutex::new(snapshot)))
    }

    pub fn replace(&self, snapshot: CatalogSnapshot) {
        *self.0.lock() = snapshot;
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load_snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(self.0.lock().clone())
    }
}

/* -------------------------------------------------------------------------- */
/* Engine */
/* -------------------------------------------------------------------------- */

pub fn retry(max_attempts: u32) -> RetryStrategy {
    RetryStrategy::custom(max_attempts, Duration::from_millis(100), Duration::from_secs(5))
        .expect("retry settings should be valid")
        .without_jitter()
}

pub fn engine(
    api: Arc<RecordingApi>,
    states: Arc<MemoryStates>,
    max_attempts: u32,
) -> SyncEngine {
    SyncEngine::new(
        api,
        states,
        Arc::new(MockClock::new()),
        SyncEngineConfig { call_timeout: Duration::from_secs(5), retry: retry(max_attempts) },
    )
}
