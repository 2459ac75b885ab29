//! Idempotent push of resolved configurations to the budgeting system
//!
//! One request per key runs at a time. A newer request for the same key
//! supersedes an older one at its next step boundary or while it waits out a
//! backoff. Completed steps are remembered per content hash, so a retry or a
//! later request for the same hash resumes after the last successful call.
//!
//! Cancellation is only observed between steps. A call already sent to the
//! budgeting system always completes (bounded by `call_timeout`).

use std::sync::Arc;
use std::time::Duration;

use costsync_common::time::Clock;
use costsync_common::RetryStrategy;
use costsync_domain::constants::MAX_ERROR_MESSAGE_LENGTH;
use costsync_domain::{
    CostSyncError, ResolvedCostConfiguration, Result, SyncConfig, SyncError, SyncKey, SyncState,
};
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::sync::hash::content_hash;
use crate::sync::plan::{SyncPlan, SyncStep};
use crate::sync::ports::{BudgetingApi, SyncStateRepository};
use crate::sync::report::{StepTally, SyncOutcome, SyncReport};
use crate::sync::state::{SyncEvent, SyncPhase};

/// Timeouts and retry policy of a [`SyncEngine`].
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Upper bound for every budgeting and state-store call.
    pub call_timeout: Duration,
    pub retry: RetryStrategy,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self { call_timeout: Duration::from_secs(30), retry: RetryStrategy::default() }
    }
}

impl SyncEngineConfig {
    /// # Errors
    /// [`CostSyncError::Config`] when the retry settings are out of range.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let retry = RetryStrategy::custom(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
        .map_err(|e| CostSyncError::Config(format!("Invalid sync retry settings: {e}")))?;

        Ok(Self {
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            retry: if config.jitter { retry } else { retry.without_jitter() },
        })
    }
}

/// Steps already pushed for one content hash.
#[derive(Debug)]
struct StepProgress {
    hash: String,
    completed: usize,
}

struct KeySlot {
    progress: Mutex<Option<StepProgress>>,
    generation: watch::Sender<u64>,
    phase: parking_lot::Mutex<SyncPhase>,
}

impl KeySlot {
    fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            progress: Mutex::new(None),
            generation,
            phase: parking_lot::Mutex::new(SyncPhase::Idle),
        }
    }

    fn is_superseded(&self, generation: u64) -> bool {
        *self.generation.borrow() != generation
    }
}

/// Returns the key to `Idle` if its request is dropped mid-sync.
struct PhaseReset<'a>(&'a KeySlot);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        let mut phase = self.0.phase.lock();
        if phase.is_active() {
            *phase = SyncPhase::Idle;
        }
    }
}

enum StepRun {
    Completed,
    Superseded,
    Cancelled,
    Failed(SyncError),
}

/// Pushes resolved configurations, one request per key at a time.
pub struct SyncEngine {
    api: Arc<dyn BudgetingApi>,
    states: Arc<dyn SyncStateRepository>,
    clock: Arc<dyn Clock>,
    config: SyncEngineConfig,
    slots: DashMap<SyncKey, Arc<KeySlot>>,
}

impl SyncEngine {
    /// Creates an engine with no per-key state.
    pub fn new(
        api: Arc<dyn BudgetingApi>,
        states: Arc<dyn SyncStateRepository>,
        clock: Arc<dyn Clock>,
        config: SyncEngineConfig,
    ) -> Self {
        Self { api, states, clock, config, slots: DashMap::new() }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Current phase of `key`; `Idle` for keys never synced by this engine.
    pub fn phase(&self, key: &SyncKey) -> SyncPhase {
        self.slots.get(key).map(|slot| *slot.phase.lock()).unwrap_or_default()
    }

    fn slot(&self, key: &SyncKey) -> Arc<KeySlot> {
        let entry = self.slots.entry(key.clone()).or_insert_with(|| Arc::new(KeySlot::new()));
        Arc::clone(entry.value())
    }

    fn transition(&self, slot: &KeySlot, key: &SyncKey, event: SyncEvent) {
        let mut phase = slot.phase.lock();
        match phase.next(event) {
            Some(next) => *phase = next,
            None => warn!(key = %key, phase = ?*phase, event = ?event, "Ignoring invalid sync transition"),
        }
    }

    /// Pushes `config` unless its content hash already synced successfully.
    pub async fn sync(&self, config: Arc<ResolvedCostConfiguration>) -> SyncOutcome {
        self.sync_until(config, &CancellationToken::new()).await
    }

    /// Like [`Self::sync`], but stops at the next step boundary once `cancel`
    /// fires and reports [`SyncOutcome::Cancelled`].
    #[instrument(skip(self, config, cancel), fields(key = %config.key))]
    pub async fn sync_until(
        &self,
        config: Arc<ResolvedCostConfiguration>,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        let key = config.key.clone();
        let slot = self.slot(&key);

        let mut generation = 0;
        slot.generation.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        let mut newer_request = slot.generation.subscribe();

        let mut guard = slot.progress.lock().await;
        if slot.is_superseded(generation) {
            debug!("Newer request queued, skipping");
            return SyncOutcome::Superseded { tally: StepTally::default() };
        }
        if cancel.is_cancelled() {
            return SyncOutcome::Cancelled { tally: StepTally::default() };
        }

        self.transition(&slot, &key, SyncEvent::Started);
        let _reset = PhaseReset(&slot);

        let hash = match content_hash(&config) {
            Ok(hash) => hash,
            Err(e) => {
                self.transition(&slot, &key, SyncEvent::TerminalFailure);
                return SyncOutcome::Failed {
                    error: SyncError::Terminal(e.to_string()),
                    attempts: 0,
                    tally: StepTally::default(),
                };
            }
        };

        match self.load_state(&key).await {
            Ok(Some(state)) if state.is_current(&hash) => {
                debug!(hash = %hash, "Configuration unchanged since last sync");
                self.transition(&slot, &key, SyncEvent::Unchanged);
                return SyncOutcome::Unchanged;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "Failed to read sync state");
                self.transition(&slot, &key, SyncEvent::TerminalFailure);
                return SyncOutcome::Failed { error, attempts: 0, tally: StepTally::default() };
            }
        }

        let plan = SyncPlan::for_config(&config);
        let completed = match guard.as_ref() {
            Some(p) if p.hash == hash => p.completed.min(plan.len()),
            _ => 0,
        };
        if completed > 0 {
            debug!(completed, total = plan.len(), "Resuming partially synced configuration");
        }
        let progress = guard.insert(StepProgress { hash: hash.clone(), completed });

        let mut tally = StepTally::default();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.run_steps(&plan, progress, &slot, generation, cancel, &mut tally).await {
                StepRun::Completed => {
                    let state = SyncState::success(&hash, self.clock.utc_now());
                    if let Err(error) = self.store_state(&key, &state).await {
                        warn!(error = %error, "Synced but failed to record state");
                        self.transition(&slot, &key, SyncEvent::TerminalFailure);
                        return SyncOutcome::Failed { error, attempts, tally };
                    }
                    progress.completed = 0;
                    self.transition(&slot, &key, SyncEvent::Succeeded);
                    info!(
                        attempts,
                        budget = %config.budget_name(),
                        amount = config.monthly_budget,
                        rules = config.alert_rules.len(),
                        "Budget synced"
                    );
                    return SyncOutcome::Synced { attempts, tally };
                }
                StepRun::Superseded => {
                    debug!(attempts, "Superseded at step boundary");
                    self.transition(&slot, &key, SyncEvent::Superseded);
                    return SyncOutcome::Superseded { tally };
                }
                StepRun::Cancelled => {
                    info!(attempts, completed = progress.completed, "Sync cancelled at step boundary");
                    self.transition(&slot, &key, SyncEvent::Cancelled);
                    return SyncOutcome::Cancelled { tally };
                }
                StepRun::Failed(error) => {
                    let will_retry = error.is_transient() && self.config.retry.should_retry(attempts);
                    let event = if error.is_transient() {
                        SyncEvent::TransientFailure { will_retry }
                    } else {
                        SyncEvent::TerminalFailure
                    };
                    self.transition(&slot, &key, event);

                    if !will_retry {
                        warn!(attempts, error = %error, "Sync failed");
                        let state = SyncState::failed(
                            &hash,
                            self.clock.utc_now(),
                            truncate_message(&error.to_string(), MAX_ERROR_MESSAGE_LENGTH),
                        );
                        let error = match self.store_state(&key, &state).await {
                            Ok(()) => error,
                            Err(persist) => {
                                warn!(error = %persist, "Failed to record sync failure");
                                persist
                            }
                        };
                        return SyncOutcome::Failed { error, attempts, tally };
                    }

                    let delay = self.backoff(attempts, &error);
                    debug!(attempts, delay_ms = delay.as_millis() as u64, error = %error, "Retrying after backoff");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        _ = newer_request.changed() => {
                            debug!(attempts, "Superseded during backoff");
                            self.transition(&slot, &key, SyncEvent::Superseded);
                            return SyncOutcome::Superseded { tally };
                        }
                        () = cancel.cancelled() => {
                            debug!(attempts, "Cancelled during backoff");
                            self.transition(&slot, &key, SyncEvent::Cancelled);
                            return SyncOutcome::Cancelled { tally };
                        }
                    }
                }
            }
        }
    }

    /// Syncs every configuration concurrently. Outcomes keep input order.
    pub async fn sync_all(&self, configs: Vec<Arc<ResolvedCostConfiguration>>) -> SyncReport {
        self.sync_all_until(configs, &CancellationToken::new()).await
    }

    /// [`Self::sync_all`] with every request bound to `cancel`.
    pub async fn sync_all_until(
        &self,
        configs: Vec<Arc<ResolvedCostConfiguration>>,
        cancel: &CancellationToken,
    ) -> SyncReport {
        let outcomes = join_all(configs.into_iter().map(|config| async move {
            let key = config.key.clone();
            (key, self.sync_until(config, cancel).await)
        }))
        .await;
        SyncReport::new(outcomes)
    }

    /// Exponential backoff, stretched to the server's `Retry-After` but never
    /// past the strategy's maximum delay.
    fn backoff(&self, attempts: u32, error: &SyncError) -> Duration {
        let backoff = self.config.retry.get_delay(attempts - 1);
        match error.retry_after() {
            Some(requested) => backoff.max(requested).min(self.config.retry.max_delay()),
            None => backoff,
        }
    }

    async fn run_steps(
        &self,
        plan: &SyncPlan,
        progress: &mut StepProgress,
        slot: &KeySlot,
        generation: u64,
        cancel: &CancellationToken,
        tally: &mut StepTally,
    ) -> StepRun {
        for step in &plan.steps()[progress.completed..] {
            if slot.is_superseded(generation) {
                return StepRun::Superseded;
            }
            if cancel.is_cancelled() {
                return StepRun::Cancelled;
            }

            let result = self.call(step).await;
            match (step, result.is_ok()) {
                (SyncStep::Budget(_), true) => tally.budgets_upserted += 1,
                (SyncStep::Budget(_), false) => tally.budget_failures += 1,
                (SyncStep::AlertRule(_), true) => tally.alert_rules_upserted += 1,
                (SyncStep::AlertRule(_), false) => tally.alert_rule_failures += 1,
            }

            if let Err(error) = result {
                debug!(step = step.label(), error = %error, "Step failed");
                return StepRun::Failed(error);
            }
            progress.completed += 1;
        }
        StepRun::Completed
    }

    async fn call(&self, step: &SyncStep) -> std::result::Result<(), SyncError> {
        let request = async {
            match step {
                SyncStep::Budget(budget) => self.api.upsert_budget(budget).await,
                SyncStep::AlertRule(rule) => self.api.upsert_alert_rule(rule).await,
            }
        };
        tokio::time::timeout(self.config.call_timeout, request)
            .await
            .unwrap_or_else(|_| Err(SyncError::Timeout(self.timeout_millis())))
    }

    async fn load_state(&self, key: &SyncKey) -> std::result::Result<Option<SyncState>, SyncError> {
        match tokio::time::timeout(self.config.call_timeout, self.states.get(key)).await {
            Ok(result) => result.map_err(|e| SyncError::Persistence(e.to_string())),
            Err(_) => Err(SyncError::Persistence(format!(
                "reading state timed out after {}ms",
                self.timeout_millis()
            ))),
        }
    }

    async fn store_state(&self, key: &SyncKey, state: &SyncState) -> std::result::Result<(), SyncError> {
        match tokio::time::timeout(self.config.call_timeout, self.states.put(key, state)).await {
            Ok(result) => result.map_err(|e| SyncError::Persistence(e.to_string())),
            Err(_) => Err(SyncError::Persistence(format!(
                "writing state timed out after {}ms",
                self.timeout_millis()
            ))),
        }
    }

    fn timeout_millis(&self) -> u64 {
        u64::try_from(self.config.call_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((end, _)) => message[..end].to_string(),
        None => message.to_string(),
    }
}
