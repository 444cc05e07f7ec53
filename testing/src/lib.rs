//! # Chat Relay Testing
//!
//! Testing utilities and helpers for Chat Relay.
//!
//! This crate provides:
//! - Mock implementations of the environment traits (clocks, id generator)
//! - A scriptable mock webhook that records what it was sent
//! - [`RelayHarness`], a fully wired in-memory relay
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use chat_relay_testing::RelayHarness;
//!
//! #[tokio::test]
//! async fn test_dispatch() {
//!     let harness = RelayHarness::new();
//!     let id = harness.relay.dispatch(harness.dispatch_request(json!({}))).await.unwrap();
//!     assert_eq!(harness.relay.poll(&id).await.unwrap(), PollOutcome::Processing);
//! }
//! ```

use chat_relay_core::environment::{Clock, IdGenerator};
use chat_relay_core::record::RequestId;
use chrono::{DateTime, Utc};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, RequestId, Utc};
    use chat_relay_core::record::RequestRecord;
    use chat_relay_core::store::{RecordStore, StoreError};
    use chat_relay_core::webhook::{Webhook, WebhookError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use chat_relay_testing::mocks::FixedClock;
    /// use chat_relay_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Clock that only moves when told to.
    ///
    /// Used to fast-forward through TTL windows.
    ///
    /// ```
    /// use chat_relay_testing::mocks::ManualClock;
    /// use chat_relay_core::environment::Clock;
    ///
    /// let clock = ManualClock::default();
    /// let before = clock.now();
    /// clock.advance(chrono::Duration::hours(1));
    /// assert_eq!(clock.now() - before, chrono::Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(test_epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Predictable ids: `req-1`, `req-2`, ...
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator starting at `req-1`.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self, _now: DateTime<Utc>) -> RequestId {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            RequestId::new(format!("req-{n}"))
        }
    }

    /// How the mock webhook answers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WebhookBehavior {
        /// Acknowledge with 202.
        Accept,
        /// Answer with this non-success status.
        Reject(u16),
        /// Fail as if the host were down.
        Unreachable,
    }

    /// Scriptable webhook that records every payload it receives.
    ///
    /// Clones share state, so a test can keep a handle after moving one into the relay.
    #[derive(Debug, Clone)]
    pub struct MockWebhook {
        behavior: Arc<Mutex<WebhookBehavior>>,
        received: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl MockWebhook {
        /// A webhook that accepts everything.
        #[must_use]
        pub fn accepting() -> Self {
            Self::with_behavior(WebhookBehavior::Accept)
        }

        /// A webhook that behaves as given.
        #[must_use]
        pub fn with_behavior(behavior: WebhookBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                received: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Change behavior for subsequent calls.
        pub fn set_behavior(&self, behavior: WebhookBehavior) {
            *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
        }

        /// Every payload received so far, including rejected ones.
        #[must_use]
        pub fn received(&self) -> Vec<serde_json::Value> {
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// The most recent payload.
        #[must_use]
        pub fn last_payload(&self) -> Option<serde_json::Value> {
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last()
                .cloned()
        }
    }

    impl Default for MockWebhook {
        fn default() -> Self {
            Self::accepting()
        }
    }

    impl Webhook for MockWebhook {
        async fn forward(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
            let behavior = *self.behavior.lock().unwrap_or_else(PoisonError::into_inner);
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());

            match behavior {
                WebhookBehavior::Accept => Ok(()),
                WebhookBehavior::Reject(status) => Err(WebhookError::Rejected { status }),
                WebhookBehavior::Unreachable => Err(WebhookError::Unreachable(
                    "connection refused".to_string(),
                )),
            }
        }
    }

    /// Store whose every operation fails, for exercising error paths.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnavailableStore;

    impl UnavailableStore {
        fn error() -> StoreError {
            StoreError::Connection("store unavailable".to_string())
        }
    }

    impl RecordStore for UnavailableStore {
        async fn get(&self, _id: &RequestId) -> Result<Option<RequestRecord>, StoreError> {
            Err(Self::error())
        }

        async fn set_with_ttl(
            &self,
            _id: &RequestId,
            _record: RequestRecord,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(Self::error())
        }

        async fn delete(&self, _id: &RequestId) -> Result<(), StoreError> {
            Err(Self::error())
        }

        async fn take(&self, _id: &RequestId) -> Result<Option<RequestRecord>, StoreError> {
            Err(Self::error())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(Self::error())
        }
    }
}

/// A relay wired to in-memory mocks.
pub mod harness {
    use super::mocks::{ManualClock, MockWebhook, SequentialIdGenerator};
    use chat_relay_core::relay::{DispatchRequest, Relay, RelayConfig, RelayEnvironment};
    use chat_relay_core::store::InMemoryRecordStore;
    use std::sync::Arc;

    /// Base URL the harness dispatches with.
    pub const TEST_CALLBACK_BASE: &str = "http://relay.test";

    /// Relay over an in-memory store, a manual clock, sequential ids and a mock webhook.
    ///
    /// The clock, store and webhook handles share state with the relay.
    pub struct RelayHarness {
        /// The relay under test.
        pub relay: Relay<InMemoryRecordStore, MockWebhook>,
        /// Clock driving record expiry.
        pub clock: ManualClock,
        /// The relay's store.
        pub store: InMemoryRecordStore,
        /// The relay's webhook.
        pub webhook: MockWebhook,
    }

    impl RelayHarness {
        /// Harness with default configuration and an accepting webhook.
        #[must_use]
        pub fn new() -> Self {
            Self::with_config(RelayConfig::default())
        }

        /// Harness with the given configuration and an accepting webhook.
        #[must_use]
        pub fn with_config(config: RelayConfig) -> Self {
            Self::build(config, Some(MockWebhook::accepting()))
        }

        /// Harness with no webhook configured.
        #[must_use]
        pub fn without_webhook() -> Self {
            Self::build(RelayConfig::default(), None)
        }

        fn build(config: RelayConfig, webhook: Option<MockWebhook>) -> Self {
            let clock = ManualClock::default();
            let store = InMemoryRecordStore::new(Arc::new(clock.clone()));
            let handle = webhook.clone().unwrap_or_default();

            let env = RelayEnvironment::new(
                store.clone(),
                webhook,
                Arc::new(clock.clone()),
                Arc::new(SequentialIdGenerator::new()),
            );

            Self {
                relay: Relay::new(env, config),
                clock,
                store,
                webhook: handle,
            }
        }

        /// Dispatch request from `alice` carrying `payload`.
        #[must_use]
        pub fn dispatch_request(&self, payload: serde_json::Value) -> DispatchRequest {
            DispatchRequest::new("alice", payload, TEST_CALLBACK_BASE)
        }
    }

    impl Default for RelayHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Arbitrary flat JSON object resembling a chat request body.
    pub fn client_payload() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,32}", 0..6).prop_map(|fields| {
            let map: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Value::Object(map)
        })
    }

    /// Arbitrary client identifier.
    pub fn client_id() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,24}"
    }
}

// Re-export commonly used items
pub use harness::RelayHarness;
pub use mocks::{
    FixedClock, ManualClock, MockWebhook, SequentialIdGenerator, UnavailableStore, WebhookBehavior,
    test_clock,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chat_relay_core::webhook::{Webhook, WebhookError};
    use serde_json::json;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::default();
        let handle = clock.clone();

        handle.advance(chrono::Duration::minutes(61));

        assert_eq!(clock.now(), mocks::test_epoch() + chrono::Duration::minutes(61));
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new();
        let now = mocks::test_epoch();
        assert_eq!(ids.next_id(now).as_str(), "req-1");
        assert_eq!(ids.next_id(now).as_str(), "req-2");
    }

    #[tokio::test]
    async fn test_mock_webhook_records_and_rejects() {
        let webhook = MockWebhook::accepting();
        assert!(webhook.forward(&json!({"n": 1})).await.is_ok());

        webhook.set_behavior(WebhookBehavior::Reject(503));
        assert_eq!(
            webhook.forward(&json!({"n": 2})).await,
            Err(WebhookError::Rejected { status: 503 })
        );

        assert_eq!(webhook.received().len(), 2);
        assert_eq!(webhook.last_payload(), Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        use chat_relay_core::store::RecordStore;

        let store = UnavailableStore;
        assert!(store.ping().await.is_err());
        assert!(store.get(&"req-1".into()).await.is_err());
    }
}
