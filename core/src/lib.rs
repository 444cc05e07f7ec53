//! # Chat Relay Core
//!
//! Core types and services for the Chat Relay: a single-shot
//! request / callback / poll relay in front of an external workflow webhook.
//!
//! ## Core Concepts
//!
//! - **Request Record**: the `processing` / `completed` state of one relayed request
//! - **Record Store**: a TTL-keyed store holding request records
//! - **Webhook**: the external endpoint that performs the actual processing
//! - **Relay**: the service tying dispatch, callback and poll together
//! - **Environment**: injected dependencies (clock, id generator) via traits
//!
//! ## Lifecycle
//!
//! ```text
//!   dispatch ──► processing ──callback──► completed ──poll──► (deleted)
//!                    │                        │
//!                    └────────── TTL ─────────┴──────────► (expired)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use chat_relay_core::relay::{DispatchRequest, Relay, RelayConfig, RelayEnvironment};
//!
//! let env = RelayEnvironment::new(store, Some(webhook), clock, ids);
//! let relay = Relay::new(env, RelayConfig::default());
//!
//! let request_id = relay
//!     .dispatch(DispatchRequest::new("anon", payload, "https://relay.example.com"))
//!     .await?;
//! ```

#![forbid(unsafe_code)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod record;
pub mod relay;
pub mod signing;
pub mod store;
pub mod webhook;

pub use record::{RequestId, RequestRecord, RequestStatus};
pub use relay::{PollOutcome, Relay, RelayConfig, RelayEnvironment, RelayError};
pub use store::{RecordStore, StoreError};
pub use webhook::{Webhook, WebhookError};

/// Environment module - Dependency injection traits
///
/// All sources of non-determinism (wall clock, random identifiers) are
/// abstracted behind traits and injected into the relay.
pub mod environment {
    use crate::record::RequestId;
    use chrono::{DateTime, Utc};
    use rand::Rng;
    use rand::distributions::Alphanumeric;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Generates correlation identifiers for dispatched requests.
    pub trait IdGenerator: Send + Sync {
        /// Produce a new request id. `now` is the dispatch time.
        fn next_id(&self, now: DateTime<Utc>) -> RequestId;
    }

    /// Time-based id generator with a random alphanumeric suffix.
    ///
    /// Ids look like `m5x1q2k0-a8Zk3PqL`: the dispatch time in milliseconds
    /// (base 36), a dash, and `suffix_len` random characters. Uniqueness is
    /// probabilistic; collisions are not detected.
    #[derive(Debug, Clone, Copy)]
    pub struct TimestampIdGenerator {
        suffix_len: usize,
    }

    impl TimestampIdGenerator {
        /// Default number of random characters after the timestamp.
        pub const DEFAULT_SUFFIX_LEN: usize = 8;

        /// Create a generator with the default suffix length.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                suffix_len: Self::DEFAULT_SUFFIX_LEN,
            }
        }

        /// Set the random suffix length.
        #[must_use]
        pub const fn with_suffix_len(mut self, suffix_len: usize) -> Self {
            self.suffix_len = suffix_len;
            self
        }
    }

    impl Default for TimestampIdGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdGenerator for TimestampIdGenerator {
        fn next_id(&self, now: DateTime<Utc>) -> RequestId {
            #[allow(clippy::cast_sign_loss)] // Clamped to zero
            let millis = now.timestamp_millis().max(0) as u64;

            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(self.suffix_len)
                .map(char::from)
                .collect();

            RequestId::new(format!("{}-{suffix}", to_base36(millis)))
        }
    }

    fn to_base36(mut value: u64) -> String {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        if value == 0 {
            return "0".to_string();
        }

        let mut digits = Vec::new();
        while value > 0 {
            #[allow(clippy::cast_possible_truncation)] // Always < 36
            digits.push(char::from(DIGITS[(value % 36) as usize]));
            value /= 36;
        }
        digits.iter().rev().collect()
    }

}
