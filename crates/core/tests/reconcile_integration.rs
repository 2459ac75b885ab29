//! Full reconcile passes: resolve, validate, publish, sync.

mod support;

use std::sync::Arc;

use costsync_common::time::MockClock;
use costsync_core::{ReconcileService, ResolvedConfigStore, ResolvedEntry, Resolver, Validator};
use costsync_domain::{
    AlertChannel, ChannelKind, Environment, OverrideBlock, Severity, SyncKey, ValidationConfig,
    ValidationViolation,
};
use support::{declaration, engine, rule, snapshot, MemoryStates, RecordingApi, StaticCatalog};

fn service(
    catalog: Arc<StaticCatalog>,
    api: Arc<RecordingApi>,
) -> ReconcileService {
    ReconcileService::new(
        catalog,
        Resolver::default(),
        Validator::new(ValidationConfig::default()).unwrap(),
        Arc::new(engine(api, MemoryStates::new(), 3)),
        Arc::new(ResolvedConfigStore::new()),
        Arc::new(MockClock::new()),
    )
}

/// Over budget, a single alert rule and a malformed email channel.
fn misconfigured() -> costsync_domain::ServiceCostDeclaration {
    let mut lone = rule("ledger-critical", 100.0, Severity::Critical, "#team-ledger");
    lone.channels.push(AlertChannel::new(ChannelKind::Email, "finance-at-example"));

    let mut decl = declaration("ledger", "medium");
    decl.environments = vec![Environment::IntStable];
    decl.overrides.service = Some(OverrideBlock {
        budget_multiplier: Some(20.0),
        alerts: Some(vec![lone]),
        optimization: None,
    });
    decl
}

#[tokio::test]
async fn pass_syncs_valid_keys_and_records_every_failure() {
    let mut orphan = declaration("reports", "medium");
    orphan.profile = "batch-job".into();
    let catalog = StaticCatalog::new(snapshot(vec![declaration("checkout", "medium"), misconfigured(), orphan]));
    let api = RecordingApi::new();
    let reconcile = service(catalog, api.clone());

    let report = reconcile.run_pass().await.unwrap();

    assert_eq!(report.catalog_version.as_deref(), Some("test-1"));
    assert_eq!(report.resolved, 3);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.unresolvable, 3);
    assert_eq!(report.sync.synced(), 3);
    assert!(report.has_failures());
    assert_eq!(api.budget_calls(), 3);

    let store = reconcile.store();
    assert_eq!(store.failures().len(), 4);
    assert_eq!(store.resolved().len(), 4);

    let ledger = SyncKey::new("ledger", Environment::IntStable);
    let Some(ResolvedEntry::Invalid { error, .. }) = store.get(&ledger) else {
        panic!("ledger should fail validation");
    };
    assert_eq!(error.violations.len(), 3);
    assert!(matches!(error.violations[0], ValidationViolation::BudgetOutOfRange { amount: 20_000, .. }));
    assert!(error.violations.contains(&ValidationViolation::TooFewAlertRules { count: 1, min: 2 }));
    assert!(error
        .violations
        .iter()
        .any(|v| matches!(v, ValidationViolation::InvalidEmail { value, .. } if value == "finance-at-example")));
}

#[tokio::test]
async fn second_pass_over_same_catalog_is_a_no_op() {
    let catalog = StaticCatalog::new(snapshot(vec![declaration("checkout", "medium")]));
    let api = RecordingApi::new();
    let reconcile = service(catalog.clone(), api.clone());

    reconcile.run_pass().await.unwrap();
    api.clear();

    let report = reconcile.run_pass().await.unwrap();
    assert_eq!(report.sync.unchanged(), 3);
    assert!(!report.has_failures());
    assert!(api.calls().is_empty());

    let mut bigger = declaration("checkout", "large");
    bigger.environments = vec![Environment::Prod];
    catalog.replace(snapshot(vec![bigger]));

    let report = reconcile.run_pass().await.unwrap();
    assert_eq!(report.sync.synced(), 1);
    assert_eq!(reconcile.store().current().entries.len(), 1);
    assert!(matches!(
        &api.calls()[0],
        support::Call::Budget { name, amount: 7200 } if name == "checkout-prod"
    ));
}

#[tokio::test]
async fn rules_rendering_to_one_name_are_never_pushed() {
    let mut decl = declaration("checkout", "medium");
    decl.environments = vec![Environment::IntStable];
    decl.overrides.service = Some(OverrideBlock {
        budget_multiplier: None,
        alerts: Some(vec![
            rule("{service}-budget", 80.0, Severity::Warning, "#team-{service}"),
            rule("{service}-budget", 100.0, Severity::Critical, "#team-{service}"),
        ]),
        optimization: None,
    });
    let api = RecordingApi::new();
    let reconcile = service(StaticCatalog::new(snapshot(vec![decl])), api.clone());

    let report = reconcile.run_pass().await.unwrap();

    assert_eq!(report.invalid, 1);
    assert_eq!(report.sync.synced(), 0);
    assert!(api.calls().is_empty());
    let key = SyncKey::new("checkout", Environment::IntStable);
    let Some(ResolvedEntry::Invalid { error, .. }) = reconcile.store().get(&key) else {
        panic!("expected an invalid entry for {key}");
    };
    assert_eq!(
        error.violations,
        vec![ValidationViolation::DuplicateAlertRule { rule: "checkout-budget".into() }]
    );
}
