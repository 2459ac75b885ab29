//! Queryable store of the most recently published resolution pass

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use costsync_domain::{ConfigurationError, ResolvedCostConfiguration, SyncKey, ValidationError};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};

/// Result of resolving and validating one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolvedEntry {
    Valid { config: Arc<ResolvedCostConfiguration> },
    /// Resolved, but blocked from sync by business rules.
    Invalid { config: Arc<ResolvedCostConfiguration>, error: ValidationError },
    Unresolvable { error: ConfigurationError },
}

impl ResolvedEntry {
    /// The resolved configuration, valid or not.
    pub fn config(&self) -> Option<&Arc<ResolvedCostConfiguration>> {
        match self {
            Self::Valid { config } | Self::Invalid { config, .. } => Some(config),
            Self::Unresolvable { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { error, .. } => Some(error.to_string()),
            Self::Unresolvable { error } => Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedSnapshot {
    pub catalog_version: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "entries_by_display_key")]
    pub entries: BTreeMap<SyncKey, ResolvedEntry>,
}

/// JSON object keys must be strings; keys serialize as `service/environment`.
fn entries_by_display_key<S: Serializer>(
    entries: &BTreeMap<SyncKey, ResolvedEntry>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(key, entry)| (key.to_string(), entry)))
}

impl ResolvedSnapshot {
    pub fn get(&self, key: &SyncKey) -> Option<&ResolvedEntry> {
        self.entries.get(key)
    }

    /// Configurations that passed validation, in key order.
    pub fn valid_configs(&self) -> Vec<Arc<ResolvedCostConfiguration>> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                ResolvedEntry::Valid { config } => Some(Arc::clone(config)),
                _ => None,
            })
            .collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.entries.values().filter(|e| matches!(e, ResolvedEntry::Invalid { .. })).count()
    }

    pub fn unresolvable_count(&self) -> usize {
        self.entries.values().filter(|e| matches!(e, ResolvedEntry::Unresolvable { .. })).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds the latest published snapshot. Readers get a cheap `Arc` clone and
/// never observe a pass half-published.
#[derive(Debug, Default)]
pub struct ResolvedConfigStore {
    current: RwLock<Arc<ResolvedSnapshot>>,
}

impl ResolvedConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: ResolvedSnapshot) -> Arc<ResolvedSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Arc::clone(&snapshot);
        snapshot
    }

    pub fn current(&self) -> Arc<ResolvedSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn get(&self, key: &SyncKey) -> Option<ResolvedEntry> {
        self.current.read().get(key).cloned()
    }

    /// Every resolved configuration, valid or not.
    pub fn resolved(&self) -> Vec<Arc<ResolvedCostConfiguration>> {
        self.current.read().entries.values().filter_map(ResolvedEntry::config).cloned().collect()
    }

    /// Keys blocked by a configuration or validation error, with the reason.
    pub fn failures(&self) -> Vec<(SyncKey, String)> {
        self.current
            .read()
            .entries
            .iter()
            .filter_map(|(key, entry)| entry.error_message().map(|msg| (key.clone(), msg)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use costsync_domain::Environment;

    use super::*;

    #[test]
    fn empty_store_has_nothing() {
        let store = ResolvedConfigStore::new();
        assert!(store.current().is_empty());
        assert!(store.get(&SyncKey::new("a", Environment::Prod)).is_none());
        assert!(store.failures().is_empty());
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let store = ResolvedConfigStore::new();
        let key = SyncKey::new("billing", Environment::Prod);
        let error = ConfigurationError::UnknownProfile {
            service: "billing".into(),
            profile: "nope".into(),
        };

        let mut first = ResolvedSnapshot::default();
        first.entries.insert(key.clone(), ResolvedEntry::Unresolvable { error: error.clone() });
        let held = store.publish(first);

        assert_eq!(store.failures(), vec![(key.clone(), error.to_string())]);
        assert_eq!(store.resolved().len(), 0);

        store.publish(ResolvedSnapshot::default());
        assert!(store.get(&key).is_none());
        assert!(held.get(&key).is_some());
    }

    #[test]
    fn snapshot_serializes_with_string_keys() {
        let mut snapshot = ResolvedSnapshot::default();
        snapshot.entries.insert(
            SyncKey::new("billing", Environment::Prod),
            ResolvedEntry::Unresolvable {
                error: ConfigurationError::UnknownProfile {
                    service: "billing".into(),
                    profile: "nope".into(),
                },
            },
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["entries"]["billing/prod"]["status"], "unresolvable");
    }
}
