//! HTTP adapter for the [`BudgetingApi`] port
//!
//! Both operations are `PUT`s keyed by name, so a repeated call converges on
//! the same remote state:
//!
//! - `PUT {base}/budgets/{budget}`
//! - `PUT {base}/budgets/{budget}/alert-rules/{rule}`
//!
//! Every request carries the configured timeout and, when set, a bearer
//! token. Responses are classified into [`SyncError`] through
//! [`BudgetApiError`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use costsync_common::error::CommonError;
use costsync_core::{AlertRuleUpsert, BudgetUpsert, BudgetingApi};
use costsync_domain::{BudgetingConfig, SyncError};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::errors::BudgetApiError;
use crate::observability::SyncMetrics;

const BUDGETS_ENDPOINT: &str = "budgets";
const ALERT_RULES_ENDPOINT: &str = "alert_rules";
/// Response bodies are cut to this many bytes before logging.
const MAX_ERROR_BODY: usize = 256;

/// Configuration for [`HttpBudgetingClient`]
#[derive(Debug, Clone)]
pub struct HttpBudgetingClientConfig {
    /// Base URL, e.g. `https://budgets.example.com/api/v1`
    pub base_url: String,
    pub api_token: Option<String>,
    /// Timeout for each request
    pub timeout: Duration,
    /// Ignore `HTTP(S)_PROXY` from the environment
    pub no_proxy: bool,
}

impl Default for HttpBudgetingClientConfig {
    fn default() -> Self {
        Self::from(&BudgetingConfig::default())
    }
}

impl From<&BudgetingConfig> for HttpBudgetingClientConfig {
    fn from(config: &BudgetingConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            no_proxy: false,
        }
    }
}

pub struct HttpBudgetingClient {
    http: Client,
    base_url: Url,
    config: HttpBudgetingClientConfig,
    metrics: Option<Arc<SyncMetrics>>,
}

impl HttpBudgetingClient {
    /// # Errors
    /// [`BudgetApiError::InvalidUrl`] for a base URL that cannot carry path
    /// segments, or a config error if the HTTP client cannot be built.
    pub fn with_config(config: HttpBudgetingClientConfig) -> Result<Self, BudgetApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| BudgetApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(BudgetApiError::InvalidUrl(config.base_url.clone()));
        }

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("costsync/", env!("CARGO_PKG_VERSION")));
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| CommonError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url, config, metrics: None })
    }

    /// # Errors
    /// See [`HttpBudgetingClient::with_config`].
    pub fn from_config(config: &BudgetingConfig) -> Result<Self, BudgetApiError> {
        Self::with_config(HttpBudgetingClientConfig::from(config))
    }

    /// Records every request into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &HttpBudgetingClientConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BudgetApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BudgetApiError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn put<T: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        url: Url,
        body: &T,
    ) -> Result<(), BudgetApiError> {
        let mut request = self.http.put(url.clone()).json(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.record(endpoint, None, started.elapsed());
                return Err(if e.is_timeout() {
                    CommonError::timeout(endpoint, self.config.timeout).into()
                } else {
                    BudgetApiError::Transport { endpoint: endpoint.to_string(), message: e.to_string() }
                });
            }
        };

        let status = response.status();
        self.record(endpoint, Some(status.as_u16()), started.elapsed());

        if status.is_success() {
            debug!(%url, status = status.as_u16(), "Budgeting request accepted");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CommonError::rate_limit(retry_after(response.headers())).into());
        }

        let body = truncate_body(response.text().await.unwrap_or_default());
        warn!(%url, status = status.as_u16(), body = %body, "Budgeting request failed");
        Err(BudgetApiError::from_status(endpoint, status.as_u16(), body))
    }

    fn record(&self, endpoint: &str, status: Option<u16>, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            if let Err(e) = metrics.record_api_request(endpoint, "PUT", status, elapsed) {
                warn!(error = %e, "Failed to record budgeting API metric");
            }
        }
    }
}

#[async_trait]
impl BudgetingApi for HttpBudgetingClient {
    #[instrument(skip_all, fields(budget = %request.name, amount = request.amount))]
    async fn upsert_budget(&self, request: &BudgetUpsert) -> Result<(), SyncError> {
        let url = self.url(&["budgets", &request.name])?;
        self.put(BUDGETS_ENDPOINT, url, request).await.map_err(SyncError::from)
    }

    #[instrument(skip_all, fields(budget = %request.budget_name, rule = %request.rule_name))]
    async fn upsert_alert_rule(&self, request: &AlertRuleUpsert) -> Result<(), SyncError> {
        let url = self.url(&["budgets", &request.budget_name, "alert-rules", &request.rule_name])?;
        self.put(ALERT_RULES_ENDPOINT, url, request).await.map_err(SyncError::from)
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
