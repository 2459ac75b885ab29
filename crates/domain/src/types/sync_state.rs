//! Persisted sync state per sync key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl_domain_status_conversions!(SyncStatus {
    Success => "success",
    Failed => "failed",
});

/// Outcome of the last completed sync attempt chain for one key.
///
/// Written only once an attempt chain finishes, either successfully or with
/// a terminal or exhausted failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_synced_hash: String,
    pub last_synced_at: DateTime<Utc>,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn success(hash: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_synced_hash: hash.into(),
            last_synced_at: at,
            status: SyncStatus::Success,
            last_error: None,
        }
    }

    pub fn failed(hash: impl Into<String>, at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            last_synced_hash: hash.into(),
            last_synced_at: at,
            status: SyncStatus::Failed,
            last_error: Some(error.into()),
        }
    }

    /// True when `hash` was already pushed successfully.
    pub fn is_current(&self, hash: &str) -> bool {
        self.status == SyncStatus::Success && self.last_synced_hash == hash
    }
}
