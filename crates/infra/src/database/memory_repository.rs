//! Process-local [`SyncStateRepository`] for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use costsync_core::SyncStateRepository;
use costsync_domain::{Result, SyncKey, SyncState};
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct InMemorySyncStateRepository {
    states: RwLock<BTreeMap<SyncKey, SyncState>>,
}

impl InMemorySyncStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl SyncStateRepository for InMemorySyncStateRepository {
    async fn get(&self, key: &SyncKey) -> Result<Option<SyncState>> {
        Ok(self.states.read().get(key).cloned())
    }

    async fn put(&self, key: &SyncKey, state: &SyncState) -> Result<()> {
        self.states.write().insert(key.clone(), state.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(SyncKey, SyncState)>> {
        Ok(self.states.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use costsync_domain::Environment;

    use super::*;

    #[tokio::test]
    async fn stores_latest_state_per_key() {
        let repo = InMemorySyncStateRepository::new();
        let key = SyncKey::new("checkout", Environment::Prod);

        repo.put(&key, &SyncState::failed("h1", Utc::now(), "boom")).await.unwrap();
        repo.put(&key, &SyncState::success("h1", Utc::now())).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert!(repo.get(&key).await.unwrap().unwrap().is_current("h1"));
    }
}
