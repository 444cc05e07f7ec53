//! In-memory record store.
//!
//! Expiry is computed against an injected [`Clock`], so tests can advance time
//! instead of sleeping. Expired entries are dropped lazily on access and in
//! bulk by [`InMemoryRecordStore::purge_expired`].

use super::{RecordStore, Result};
use crate::environment::Clock;
use crate::record::{RequestId, RequestRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    record: RequestRecord,
    /// `None` when the TTL does not fit in a timestamp.
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Single-process record store.
///
/// Cloning is cheap; clones share the same map.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    entries: Arc<Mutex<HashMap<RequestId, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRecordStore {
    /// Create an empty store using `clock` for expiry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live (unexpired) records.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether no live record exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired record, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn expiry(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl).ok()?;
        self.clock.now().checked_add_signed(ttl)
    }
}

impl fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRecordStore").finish_non_exhaustive()
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &RequestId) -> Result<Option<RequestRecord>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        match entries.get(id) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.record.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, id: &RequestId, record: RequestRecord, ttl: Duration) -> Result<()> {
        let entry = Entry {
            record,
            expires_at: self.expiry(ttl),
        };
        self.entries.lock().await.insert(id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &RequestId) -> Result<()> {
        self.entries.lock().await.remove(id);
        Ok(())
    }

    async fn take(&self, id: &RequestId) -> Result<Option<RequestRecord>> {
        let now = self.clock.now();

        // Single lock scope: concurrent takers see the removal.
        let entry = self.entries.lock().await.remove(id);

        Ok(entry
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.record))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Minimal settable clock (the testing crate depends on this one).
    struct StepClock(StdMutex<DateTime<Utc>>);

    impl StepClock {
        fn advance(&self, by: chrono::Duration) {
            let mut time = self.0.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn store_with_clock() -> (InMemoryRecordStore, Arc<StepClock>) {
        let clock = Arc::new(StepClock(StdMutex::new(Utc::now())));
        (InMemoryRecordStore::new(clock.clone()), clock)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_get_delete() {
        let (store, clock) = store_with_clock();
        let id = RequestId::from("req-1");

        store
            .set_with_ttl(&id, RequestRecord::processing(clock.now()), HOUR)
            .await
            .unwrap();
        assert!(store.get(&id).await.unwrap().is_some());

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_expires_after_ttl() {
        let (store, clock) = store_with_clock();
        let id = RequestId::from("req-1");

        store
            .set_with_ttl(&id, RequestRecord::processing(clock.now()), HOUR)
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(59));
        assert!(store.get(&id).await.unwrap().is_some());

        clock.advance(chrono::Duration::minutes(1));
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_ttl() {
        let (store, clock) = store_with_clock();
        let id = RequestId::from("req-1");

        store
            .set_with_ttl(&id, RequestRecord::processing(clock.now()), HOUR)
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(50));

        store
            .set_with_ttl(&id, RequestRecord::completed(json!("done"), clock.now()), HOUR)
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(50));

        let record = store.get(&id).await.unwrap().unwrap();
        assert!(record.is_completed());
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let (store, clock) = store_with_clock();
        let id = RequestId::from("req-1");

        store
            .set_with_ttl(&id, RequestRecord::completed(json!("done"), clock.now()), HOUR)
            .await
            .unwrap();

        let (first, second) = tokio::join!(store.take(&id), store.take(&id));
        let delivered = [first.unwrap(), second.unwrap()]
            .iter()
            .filter(|r| r.is_some())
            .count();

        assert_eq!(delivered, 1, "Exactly one concurrent take should succeed");
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_ignores_expired_record() {
        let (store, clock) = store_with_clock();
        let id = RequestId::from("req-1");

        store
            .set_with_ttl(&id, RequestRecord::completed(json!("done"), clock.now()), HOUR)
            .await
            .unwrap();
        clock.advance(chrono::Duration::hours(2));

        assert!(store.take(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_with_clock();

        store
            .set_with_ttl(&"short".into(), RequestRecord::processing(clock.now()), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_with_ttl(&"long".into(), RequestRecord::processing(clock.now()), HOUR)
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(5));

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
