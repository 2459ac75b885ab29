//! Application context - wires configuration into running services

use std::sync::Arc;

use costsync_common::time::{Clock, SystemClock};
use costsync_core::{
    ReconcileService, ResolvedConfigStore, Resolver, SyncEngine, SyncEngineConfig,
    SyncStateRepository, Validator,
};
use costsync_domain::{Config, Result};
use tracing::info;

use crate::catalog::FileCatalogSource;
use crate::database::{DbManager, InMemorySyncStateRepository, SqliteSyncStateRepository};
use crate::observability::SyncMetrics;
use crate::scheduling::{SchedulerHandle, SyncScheduler, SyncSchedulerConfig};
use crate::sync::HttpBudgetingClient;

/// Database path that selects the in-memory sync state store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Holds every service built from one [`Config`].
pub struct CostSyncContext {
    pub config: Config,
    /// `None` when sync state lives in memory.
    pub db: Option<Arc<DbManager>>,
    pub service: Arc<ReconcileService>,
    pub metrics: Arc<SyncMetrics>,
    scheduler: SyncScheduler,
}

impl CostSyncContext {
    /// Builds the catalog source, budgeting client, sync state store, engine
    /// and scheduler. Opening the database runs its migrations.
    ///
    /// # Errors
    /// [`costsync_domain::CostSyncError::Config`] for unusable settings and
    /// [`costsync_domain::CostSyncError::Database`] when the store cannot be
    /// opened.
    pub fn new(config: Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let metrics = Arc::new(SyncMetrics::new());

        let (db, states): (Option<Arc<DbManager>>, Arc<dyn SyncStateRepository>) =
            if config.database.path == IN_MEMORY_DATABASE {
                (None, Arc::new(InMemorySyncStateRepository::new()))
            } else {
                let db = Arc::new(DbManager::from_config(&config.database)?);
                (Some(Arc::clone(&db)), Arc::new(SqliteSyncStateRepository::new(db)))
            };

        let api = HttpBudgetingClient::from_config(&config.budgeting)?
            .with_metrics(Arc::clone(&metrics));
        let engine = SyncEngine::new(
            Arc::new(api),
            states,
            Arc::clone(&clock),
            SyncEngineConfig::from_config(&config.sync)?,
        );

        let service = Arc::new(ReconcileService::new(
            Arc::new(FileCatalogSource::from_config(&config.catalog)),
            Resolver::new(&config.resolution),
            Validator::new(config.validation.clone())?,
            Arc::new(engine),
            Arc::new(ResolvedConfigStore::new()),
            Arc::clone(&clock),
        ));

        let scheduler = SyncScheduler::new(
            Arc::clone(&service),
            SyncSchedulerConfig::from_config(&config.sync),
            Arc::clone(&metrics),
            clock,
        );

        info!(
            catalog = %config.catalog.root.display(),
            budgeting = %config.budgeting.base_url,
            persistent = db.is_some(),
            "CostSync context initialised"
        );

        Ok(Self { config, db, service, metrics, scheduler })
    }

    pub fn store(&self) -> &Arc<ResolvedConfigStore> {
        self.service.store()
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn trigger(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Starts the scheduler unless sync is disabled.
    ///
    /// # Errors
    /// [`costsync_domain::CostSyncError::InvalidInput`] if already started.
    pub async fn start(&mut self) -> Result<()> {
        if !self.config.sync.enabled {
            info!("Sync disabled; scheduler not started");
            return Ok(());
        }
        Ok(self.scheduler.start().await?)
    }

    /// Stops the scheduler if it is running.
    ///
    /// # Errors
    /// [`costsync_domain::CostSyncError::Internal`] when the background task
    /// does not stop in time.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.scheduler.is_running() {
            self.scheduler.stop().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use costsync_domain::CostSyncError;
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.catalog.root = dir.path().join("catalog");
        config.database.path = dir.path().join("state.db").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn builds_a_persistent_context() {
        let dir = TempDir::new().unwrap();
        let context = CostSyncContext::new(config(&dir)).unwrap();

        let db = context.db.as_ref().unwrap();
        assert!(db.health_check().is_ok());
        assert!(context.store().current().entries.is_empty());
    }

    #[tokio::test]
    async fn memory_path_skips_the_database() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.database.path = IN_MEMORY_DATABASE.to_string();

        let context = CostSyncContext::new(config).unwrap();
        assert!(context.db.is_none());
        assert!(!dir.path().join("state.db").exists());
    }

    #[tokio::test]
    async fn disabled_sync_never_starts_the_scheduler() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.sync.enabled = false;

        let mut context = CostSyncContext::new(config).unwrap();
        context.start().await.unwrap();
        assert!(!context.scheduler().is_running());
        context.shutdown().await.unwrap();
    }

    #[test]
    fn unusable_base_url_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.budgeting.base_url = "mailto:finance@example.com".into();

        assert!(matches!(CostSyncContext::new(config), Err(CostSyncError::Config(_))));
    }
}
