//! Per-scope cache of contact listing statistics.
//!
//! Entries are computed on first read and dropped whenever an import reports
//! that it modified the scope's contacts.

use crate::import::store::{ContactStore, StoreError};
use crate::models::{ContactStats, Scope};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ContactStatsCache {
    entries: Arc<DashMap<Scope, ContactStats>>,
}

impl ContactStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: Scope) -> Option<ContactStats> {
        self.entries.get(&scope).map(|entry| entry.value().clone())
    }

    /// Return cached stats for `scope`, loading them from the store on a miss.
    pub async fn get_or_load(
        &self,
        scope: Scope,
        store: &dyn ContactStore,
    ) -> Result<ContactStats, StoreError> {
        if let Some(stats) = self.get(scope) {
            return Ok(stats);
        }

        let contacts = store.list_contacts(scope).await?;
        let stats = ContactStats::from_contacts(&contacts);
        self.entries.insert(scope, stats.clone());
        log::debug!("cached contact stats for org {} ({} contacts)", scope, stats.total);
        Ok(stats)
    }

    pub fn invalidate(&self, scope: Scope) {
        if self.entries.remove(&scope).is_some() {
            log::debug!("invalidated contact stats for org {}", scope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::candidate::CandidateRecord;
    use crate::import::memory_store::InMemoryContactStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn serves_cached_stats_until_invalidated() {
        let cache = ContactStatsCache::new();
        let store = InMemoryContactStore::new();
        let scope = Scope::new(Uuid::new_v4());
        store
            .seed(scope, &CandidateRecord::new("a@co.com", "A"))
            .expect("seed");

        let first = cache.get_or_load(scope, &store).await.expect("load");
        assert_eq!(first.total, 1);

        store
            .seed(scope, &CandidateRecord::new("b@co.com", "B"))
            .expect("seed");
        let cached = cache.get_or_load(scope, &store).await.expect("load");
        assert_eq!(cached.total, 1);

        cache.invalidate(scope);
        let fresh = cache.get_or_load(scope, &store).await.expect("load");
        assert_eq!(fresh.total, 2);
    }
}
