//! Budget sync metrics
//!
//! Counters for reconcile passes and budgeting API traffic. Pass totals and
//! upsert counts accumulate; per-environment service counts reflect the most
//! recent completed pass.
//!
//! ## Design
//! - Atomics for monotonically increasing counters
//! - **Poison-safe locking** for the keyed maps and the duration ring buffer
//! - API request series are keyed by endpoint, method and status class and
//!   capped at [`MAX_API_SERIES`]

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use costsync_core::sync::EnvironmentTotals;
use costsync_core::PassReport;
use costsync_domain::Environment;
use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

/// Retained pass durations for percentile queries.
pub const MAX_DURATION_SAMPLES: usize = 1000;
/// Distinct `(endpoint, method, status)` series kept for API requests.
pub const MAX_API_SERIES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Success,
    Failure,
    Timeout,
}

/// HTTP status bucket for API request series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatusClass {
    Success,
    RateLimited,
    ClientError,
    ServerError,
    /// No response: connection failure or timeout.
    Unknown,
}

impl ApiStatusClass {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(200..=299) => Self::Success,
            Some(429) => Self::RateLimited,
            Some(400..=499) => Self::ClientError,
            Some(500..=599) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ApiStatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::RateLimited => "rate_limited",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ApiSeries {
    pub endpoint: String,
    pub method: String,
    pub status: ApiStatusClass,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApiRequestStats {
    pub count: u64,
    pub total_ms: u64,
}

#[derive(Debug, Default)]
struct PassCounters {
    success: AtomicU64,
    failure: AtomicU64,
    timeout: AtomicU64,
}

impl PassCounters {
    fn counter(&self, status: PassStatus) -> &AtomicU64 {
        match status {
            PassStatus::Success => &self.success,
            PassStatus::Failure => &self.failure,
            PassStatus::Timeout => &self.timeout,
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncMetrics {
    passes: PassCounters,
    budgets_upserted: AtomicU64,
    budget_failures: AtomicU64,
    alert_rules_upserted: AtomicU64,
    alert_rule_failures: AtomicU64,
    pass_durations_ms: Mutex<VecDeque<u64>>,
    environments: Mutex<BTreeMap<Environment, EnvironmentTotals>>,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
    catalog_version: Mutex<Option<String>>,
    api_requests: Mutex<BTreeMap<ApiSeries, ApiRequestStats>>,
}

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncMetricsSnapshot {
    pub passes: BTreeMap<PassStatus, u64>,
    pub budgets_upserted: u64,
    pub budget_failures: u64,
    pub alert_rules_upserted: u64,
    pub alert_rule_failures: u64,
    pub environments: BTreeMap<Environment, EnvironmentTotals>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub catalog_version: Option<String>,
    pub api_requests: Vec<(ApiSeries, ApiRequestStats)>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, metric: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison_err) => {
            tracing::warn!(metric, "Mutex poisoned, recovering data");
            poison_err.into_inner()
        }
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed reconcile pass.
    ///
    /// A pass with any invalid, unresolvable or failed key counts as a
    /// failure. The success timestamp only moves on clean passes.
    pub fn record_pass(&self, report: &PassReport, at: DateTime<Utc>) -> MetricsResult<()> {
        let status = if report.has_failures() { PassStatus::Failure } else { PassStatus::Success };
        self.passes.counter(status).fetch_add(1, Ordering::Relaxed);
        self.record_duration(report.duration);

        let tally = report.sync.tally();
        self.budgets_upserted.fetch_add(tally.budgets_upserted.into(), Ordering::Relaxed);
        self.budget_failures.fetch_add(tally.budget_failures.into(), Ordering::Relaxed);
        self.alert_rules_upserted.fetch_add(tally.alert_rules_upserted.into(), Ordering::Relaxed);
        self.alert_rule_failures.fetch_add(tally.alert_rule_failures.into(), Ordering::Relaxed);

        *lock(&self.environments, "SyncMetrics::environments") = report.sync.per_environment();
        lock(&self.catalog_version, "SyncMetrics::catalog_version")
            .clone_from(&report.catalog_version);

        if status == PassStatus::Success {
            *lock(&self.last_success_at, "SyncMetrics::last_success_at") = Some(at);
        }

        tracing::info!(
            status = ?status,
            duration_ms = report.duration.as_millis() as u64,
            budgets_upserted = tally.budgets_upserted,
            budget_failures = tally.budget_failures,
            alert_rules_upserted = tally.alert_rules_upserted,
            alert_rule_failures = tally.alert_rule_failures,
            "Sync pass recorded"
        );
        Ok(())
    }

    /// Records a pass abandoned at its deadline.
    pub fn record_pass_timeout(&self, after: Duration) -> MetricsResult<()> {
        self.passes.counter(PassStatus::Timeout).fetch_add(1, Ordering::Relaxed);
        self.record_duration(after);
        Ok(())
    }

    /// Records a pass that failed before producing a report, e.g. because
    /// the catalog could not be loaded.
    pub fn record_pass_failure(&self, after: Duration) -> MetricsResult<()> {
        self.passes.counter(PassStatus::Failure).fetch_add(1, Ordering::Relaxed);
        self.record_duration(after);
        Ok(())
    }

    /// Records one budgeting API request. `status` is `None` when no response
    /// arrived.
    ///
    /// # Errors
    /// [`MetricsError::CardinalityExceeded`] when a new series would exceed
    /// [`MAX_API_SERIES`]; the sample is dropped.
    pub fn record_api_request(
        &self,
        endpoint: &str,
        method: &str,
        status: Option<u16>,
        duration: Duration,
    ) -> MetricsResult<()> {
        let series = ApiSeries {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status: ApiStatusClass::from_status(status),
        };

        let mut requests = lock(&self.api_requests, "SyncMetrics::api_requests");
        if !requests.contains_key(&series) && requests.len() >= MAX_API_SERIES {
            return Err(MetricsError::CardinalityExceeded {
                metric: "budgeting_api_request_total".to_string(),
                count: requests.len() + 1,
                limit: MAX_API_SERIES,
            });
        }

        let stats = requests.entry(series).or_default();
        stats.count += 1;
        stats.total_ms += duration.as_millis() as u64;
        Ok(())
    }

    pub fn passes(&self, status: PassStatus) -> u64 {
        self.passes.counter(status).load(Ordering::Relaxed)
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_success_at, "SyncMetrics::last_success_at")
    }

    /// Nearest-rank percentile of retained pass durations, `p` in `(0, 100]`.
    ///
    /// # Errors
    /// [`MetricsError::EmptyData`] before the first pass.
    pub fn pass_duration_percentile(&self, p: f64) -> MetricsResult<u64> {
        let mut samples: Vec<u64> =
            lock(&self.pass_durations_ms, "SyncMetrics::pass_durations_ms").iter().copied().collect();
        if samples.is_empty() {
            return Err(MetricsError::EmptyData { metric: "pass duration percentile" });
        }
        samples.sort_unstable();

        let rank = ((p.clamp(0.0, 100.0) / 100.0) * samples.len() as f64).ceil() as usize;
        Ok(samples[rank.clamp(1, samples.len()) - 1])
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let passes = [PassStatus::Success, PassStatus::Failure, PassStatus::Timeout]
            .into_iter()
            .map(|status| (status, self.passes(status)))
            .collect();

        SyncMetricsSnapshot {
            passes,
            budgets_upserted: self.budgets_upserted.load(Ordering::Relaxed),
            budget_failures: self.budget_failures.load(Ordering::Relaxed),
            alert_rules_upserted: self.alert_rules_upserted.load(Ordering::Relaxed),
            alert_rule_failures: self.alert_rule_failures.load(Ordering::Relaxed),
            environments: lock(&self.environments, "SyncMetrics::environments").clone(),
            last_success_at: self.last_success_at(),
            catalog_version: lock(&self.catalog_version, "SyncMetrics::catalog_version").clone(),
            api_requests: lock(&self.api_requests, "SyncMetrics::api_requests")
                .iter()
                .map(|(series, stats)| (series.clone(), *stats))
                .collect(),
        }
    }

    fn record_duration(&self, duration: Duration) {
        let mut samples = lock(&self.pass_durations_ms, "SyncMetrics::pass_durations_ms");
        samples.push_back(duration.as_millis() as u64);
        if samples.len() > MAX_DURATION_SAMPLES {
            samples.pop_front();
        }
    }
}
