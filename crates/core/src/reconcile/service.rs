use std::sync::Arc;
use std::time::Duration;

use costsync_common::time::Clock;
use costsync_domain::{CatalogSnapshot, CostSyncError, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::reconcile::store::{ResolvedConfigStore, ResolvedEntry, ResolvedSnapshot};
use crate::resolver::{resolve_catalog, Resolver};
use crate::sync::ports::CatalogSource;
use crate::sync::{SyncEngine, SyncReport};
use crate::validation::Validator;

/// Summary of one reconcile pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub catalog_version: Option<String>,
    /// Keys that resolved and passed validation.
    pub resolved: usize,
    pub invalid: usize,
    pub unresolvable: usize,
    pub sync: SyncReport,
    pub duration: Duration,
}

impl PassReport {
    pub fn has_failures(&self) -> bool {
        self.invalid > 0 || self.unresolvable > 0 || self.sync.failed() > 0
    }
}

/// Drives catalog → resolver → validator → store → sync engine.
pub struct ReconcileService {
    catalog: Arc<dyn CatalogSource>,
    resolver: Resolver,
    validator: Validator,
    engine: Arc<SyncEngine>,
    store: Arc<ResolvedConfigStore>,
    clock: Arc<dyn Clock>,
}

impl ReconcileService {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        resolver: Resolver,
        validator: Validator,
        engine: Arc<SyncEngine>,
        store: Arc<ResolvedConfigStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { catalog, resolver, validator, engine, store, clock }
    }

    pub fn store(&self) -> &Arc<ResolvedConfigStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Resolves and validates every key of `snapshot` without syncing.
    pub async fn evaluate(&self, snapshot: Arc<CatalogSnapshot>) -> ResolvedSnapshot {
        let outcomes = resolve_catalog(self.resolver, Arc::clone(&snapshot)).await;

        let entries = outcomes
            .into_iter()
            .map(|outcome| {
                let entry = match outcome.result {
                    Ok(config) => match self.validator.validate(&config) {
                        Ok(()) => ResolvedEntry::Valid { config: Arc::new(config) },
                        Err(error) => {
                            warn!(key = %outcome.key, error = %error, "Configuration failed validation");
                            ResolvedEntry::Invalid { config: Arc::new(config), error }
                        }
                    },
                    Err(error) => ResolvedEntry::Unresolvable { error },
                };
                (outcome.key, entry)
            })
            .collect();

        ResolvedSnapshot {
            catalog_version: snapshot.version.clone(),
            generated_at: Some(self.clock.utc_now()),
            entries,
        }
    }

    /// Runs one full pass. Per-key failures end up in the report; only a
    /// catalog that cannot be loaded fails the pass as a whole.
    ///
    /// # Errors
    /// Whatever [`CatalogSource::load_snapshot`] returns.
    pub async fn run_pass(&self) -> Result<PassReport> {
        self.run_pass_until(&CancellationToken::new()).await
    }

    /// [`Self::run_pass`] that winds down once `cancel` fires. Budgeting calls
    /// already sent complete; remaining keys report
    /// [`crate::SyncOutcome::Cancelled`].
    ///
    /// # Errors
    /// Whatever [`CatalogSource::load_snapshot`] returns, or
    /// [`CostSyncError::Internal`] when cancelled before the catalog loaded.
    #[instrument(skip(self, cancel))]
    pub async fn run_pass_until(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let started = self.clock.now();
        let catalog = tokio::select! {
            snapshot = self.catalog.load_snapshot() => Arc::new(snapshot?),
            () = cancel.cancelled() => {
                return Err(CostSyncError::Internal(
                    "reconcile pass cancelled while loading the catalog".into(),
                ));
            }
        };

        let snapshot = self.store.publish(self.evaluate(catalog).await);
        let valid = snapshot.valid_configs();
        let resolved = valid.len();

        let sync = self.engine.sync_all_until(valid, cancel).await;

        let report = PassReport {
            catalog_version: snapshot.catalog_version.clone(),
            resolved,
            invalid: snapshot.invalid_count(),
            unresolvable: snapshot.unresolvable_count(),
            sync,
            duration: self.clock.now().saturating_duration_since(started),
        };

        info!(
            resolved = report.resolved,
            invalid = report.invalid,
            unresolvable = report.unresolvable,
            synced = report.sync.synced(),
            unchanged = report.sync.unchanged(),
            failed = report.sync.failed(),
            cancelled = report.sync.cancelled(),
            duration_ms = report.duration.as_millis() as u64,
            "Reconcile pass complete"
        );
        Ok(report)
    }
}
