//! In-memory stub implementation of RemoteProgressStore.
//!
//! # TEST ONLY
//!
//! No persistence; data is lost when the store is dropped. Used by unit
//! tests, integration tests and the CLI simulator.
//!
//! Failure injection: [`InMemoryProgressStore::set_unavailable`] makes every
//! call fail with `StoreError::Unavailable`, which is how tests exercise the
//! "log and discard" flush path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreResult, StoreError};
use crate::traits::RemoteProgressStore;
use crate::types::{Collection, IdentityLink, ProgressPatch, ProgressRecord};

/// In-memory implementation of RemoteProgressStore.
///
/// Thread-safe via `DashMap`. `set` stamps `last_seen_at` with the store's
/// own clock, standing in for server time.
#[derive(Debug)]
pub struct InMemoryProgressStore {
    records: DashMap<(Collection, String), ProgressRecord>,
    links: DashMap<String, IdentityLink>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    sets: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryProgressStore {
    /// Create an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        info!("Creating InMemoryProgressStore (TEST ONLY)");
        Self {
            records: DashMap::new(),
            links: DashMap::new(),
            clock,
            unavailable: AtomicBool::new(false),
            sets: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed a record verbatim, without stamping.
    pub fn seed(&self, collection: Collection, id: &str, record: ProgressRecord) {
        self.records.insert((collection, id.to_string()), record);
    }

    /// Seed an identity link.
    pub fn seed_link(&self, link: IdentityLink) {
        self.links.insert(link.uid.clone(), link);
    }

    /// Peek at a stored record.
    pub fn record(&self, collection: Collection, id: &str) -> Option<ProgressRecord> {
        self.records
            .get(&(collection, id.to_string()))
            .map(|r| r.value().clone())
    }

    /// Peek at a stored link.
    pub fn link(&self, uid: &str) -> Option<IdentityLink> {
        self.links.get(uid).map(|l| l.value().clone())
    }

    /// Number of successful full-snapshot writes.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of successful partial updates.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()).into());
        }
        Ok(())
    }
}

impl Default for InMemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteProgressStore for InMemoryProgressStore {
    async fn get(&self, collection: Collection, id: &str) -> CoreResult<Option<ProgressRecord>> {
        self.check_available()?;
        Ok(self.record(collection, id))
    }

    async fn set(&self, collection: Collection, id: &str, mut record: ProgressRecord) -> CoreResult<()> {
        self.check_available()?;
        record.last_seen_at = self.clock.now();
        debug!(collection = %collection, id, score = record.coherence_score, "store set");
        self.records.insert((collection, id.to_string()), record);
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: ProgressPatch) -> CoreResult<()> {
        self.check_available()?;
        let mut entry = self
            .records
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        entry.apply_patch(&patch);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_link(&self, uid: &str) -> CoreResult<Option<IdentityLink>> {
        self.check_available()?;
        Ok(self.link(uid))
    }

    async fn set_link(&self, link: IdentityLink) -> CoreResult<()> {
        self.check_available()?;
        self.links.insert(link.uid.clone(), link);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::error::CoreError;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_set_stamps_server_time() {
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap();
        let clock = MockClock::new(start);
        let store = InMemoryProgressStore::with_clock(Arc::new(clock.clone()));

        let mut record = ProgressRecord::fresh(start);
        record.last_seen_at = start - Duration::days(3);
        clock.advance(Duration::minutes(5));
        store.set(Collection::Observers, "v-1", record).await.unwrap();

        let stored = store.get(Collection::Observers, "v-1").await.unwrap().unwrap();
        assert_eq!(stored.last_seen_at, start + Duration::minutes(5));
        assert_eq!(store.set_count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = InMemoryProgressStore::new();
        let err = store
            .update(Collection::Observers, "nope", ProgressPatch::anchoring(true, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Store(StoreError::NotFound { .. })));
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let store = InMemoryProgressStore::new();
        store.seed(Collection::Admins, "a-1", ProgressRecord::fresh(Utc::now()));
        store
            .update(
                Collection::Admins,
                "a-1",
                ProgressPatch::anchoring(true, Some("a-1".into())),
            )
            .await
            .unwrap();
        let stored = store.record(Collection::Admins, "a-1").unwrap();
        assert!(stored.is_anchored);
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = InMemoryProgressStore::new();
        store.set_unavailable(true);

        let err = store.get(Collection::Observers, "v").await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(store.get_link("u").await.is_err());
        assert!(store
            .set(Collection::Observers, "v", ProgressRecord::fresh(Utc::now()))
            .await
            .is_err());
        assert_eq!(store.set_count(), 0);

        store.set_unavailable(false);
        assert!(store.get(Collection::Observers, "v").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_links_replace_by_uid() {
        let store = InMemoryProgressStore::new();
        let now = Utc::now();
        store
            .set_link(IdentityLink { uid: "u".into(), visitor_id: "A".into(), linked_at: now })
            .await
            .unwrap();
        store
            .set_link(IdentityLink { uid: "u".into(), visitor_id: "B".into(), linked_at: now })
            .await
            .unwrap();
        assert_eq!(store.get_link("u").await.unwrap().unwrap().visitor_id, "B");
    }
}
