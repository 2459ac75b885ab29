//! Reconcile pass scheduler.
//!
//! Runs [`ReconcileService::run_pass`] every `interval` and whenever a
//! [`SchedulerHandle`] asks for it. Each pass is bounded by `pass_timeout`
//! and recorded into [`SyncMetrics`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use costsync_common::time::SystemClock;
//! use costsync_infra::observability::SyncMetrics;
//! use costsync_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
//!
//! # async fn example(service: Arc<costsync_core::ReconcileService>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut scheduler = SyncScheduler::new(
//!     service,
//!     SyncSchedulerConfig::default(),
//!     Arc::new(SyncMetrics::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! scheduler.start().await?;
//! scheduler.handle().trigger();
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use costsync_common::time::Clock;
use costsync_core::{PassReport, ReconcileService};
use costsync_domain::SyncConfig;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::{MetricsResult, SyncMetrics};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Delay between the end of one pass and the start of the next
    pub interval: Duration,
    /// Upper bound for one whole pass
    pub pass_timeout: Duration,
    /// Run a pass as soon as the scheduler starts
    pub run_on_start: bool,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(costsync_domain::constants::DEFAULT_POLL_INTERVAL_SECS),
            pass_timeout: Duration::from_secs(costsync_domain::constants::DEFAULT_PASS_TIMEOUT_SECS),
            run_on_start: true,
        }
    }
}

impl SyncSchedulerConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            pass_timeout: Duration::from_secs(config.pass_timeout_secs),
            ..Self::default()
        }
    }
}

/// Requests an out-of-schedule pass from a running [`SyncScheduler`].
///
/// Triggers made while a pass is in flight coalesce into a single follow-up
/// pass.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
}

impl SchedulerHandle {
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }
}

/// Everything one pass needs; cloned into the background task.
#[derive(Clone)]
struct PassContext {
    service: Arc<ReconcileService>,
    metrics: Arc<SyncMetrics>,
    clock: Arc<dyn Clock>,
    pass_timeout: Duration,
}

impl PassContext {
    /// At the deadline the pass is cancelled, not dropped: calls in flight
    /// finish and their keys stay resumable.
    async fn run(&self) -> SchedulerResult<PassReport> {
        let started = self.clock.now();
        let deadline = CancellationToken::new();
        let pass = self.service.run_pass_until(&deadline);
        tokio::pin!(pass);

        let finished = tokio::select! {
            result = &mut pass => Some(result),
            () = tokio::time::sleep(self.pass_timeout) => None,
        };
        let outcome = match finished {
            Some(result) => Ok(result),
            None => {
                deadline.cancel();
                warn!(
                    timeout_secs = self.pass_timeout.as_secs(),
                    "Reconcile pass deadline reached; waiting for in-flight calls"
                );
                Err(pass.await)
            }
        };

        match outcome {
            Ok(Ok(report)) => {
                log_metric(
                    self.metrics.record_pass(&report, self.clock.utc_now()),
                    "scheduler.sync.pass",
                );
                Ok(report)
            }
            Ok(Err(e)) => {
                let elapsed = self.clock.now().saturating_duration_since(started);
                log_metric(self.metrics.record_pass_failure(elapsed), "scheduler.sync.failure");
                Err(SchedulerError::PassFailed(e))
            }
            Err(wound_down) => {
                if let Ok(report) = wound_down {
                    debug!(cancelled = report.sync.cancelled(), "Reconcile pass wound down");
                }
                log_metric(
                    self.metrics.record_pass_timeout(self.pass_timeout),
                    "scheduler.sync.timeout",
                );
                Err(SchedulerError::Timeout {
                    operation: "reconcile pass",
                    duration: self.pass_timeout,
                })
            }
        }
    }
}

/// Periodic and on-demand reconcile passes
pub struct SyncScheduler {
    context: PassContext,
    config: SyncSchedulerConfig,
    trigger: Arc<Notify>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    pub fn new(
        service: Arc<ReconcileService>,
        config: SyncSchedulerConfig,
        metrics: Arc<SyncMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let context = PassContext { service, metrics, clock, pass_timeout: config.pass_timeout };
        Self {
            context,
            config,
            trigger: Arc::new(Notify::new()),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle { trigger: Arc::clone(&self.trigger) }
    }

    /// Start the scheduler
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.config.interval.as_secs(), "Starting sync scheduler");

        // Fresh token so the scheduler can restart after stop
        self.cancellation_token = CancellationToken::new();

        let context = self.context.clone();
        let config = self.config.clone();
        let trigger = Arc::clone(&self.trigger);
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sync_loop(context, config, trigger, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// A pass already in flight runs to completion first.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running, or the background task does
    /// not finish within five seconds.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { operation: "stop", duration: JOIN_TIMEOUT })??;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// `true` while the background task exists and has not finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Runs one pass on the caller's task, independent of the schedule.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Timeout`] past `pass_timeout`, or
    /// [`SchedulerError::PassFailed`] when the catalog cannot be loaded.
    pub async fn run_now(&self) -> SchedulerResult<PassReport> {
        self.context.run().await
    }

    async fn sync_loop(
        context: PassContext,
        config: SyncSchedulerConfig,
        trigger: Arc<Notify>,
        cancel: CancellationToken,
    ) {
        if config.run_on_start {
            Self::tick(&context).await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Sync loop cancelled");
                    break;
                }
                _ = trigger.notified() => debug!("Reconcile pass requested"),
                _ = tokio::time::sleep(config.interval) => debug!("Scheduled reconcile pass"),
            }
            Self::tick(&context).await;
        }
    }

    async fn tick(context: &PassContext) {
        match context.run().await {
            Ok(report) if report.has_failures() => warn!(
                invalid = report.invalid,
                unresolvable = report.unresolvable,
                failed = report.sync.failed(),
                "Reconcile pass finished with failures"
            ),
            Ok(_) => debug!("Reconcile pass clean"),
            Err(e) => error!(error = %e, "Reconcile pass failed"),
        }
    }
}

fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record scheduler metric");
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}
