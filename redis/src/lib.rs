//! `Redis` record store for Chat Relay.
//!
//! This crate provides the production [`RecordStore`] backend.
//!
//! # Architecture
//!
//! Records are stored in `Redis` with:
//! - **Primary key**: `chat:request:{request_id}` → JSON-serialized `RequestRecord`
//! - **TTL**: set on every write via `SETEX` (1 hour by default)
//! - **Atomic delivery**: `take()` uses `GETDEL`, so exactly one poller gets a result
//!
//! # Example
//!
//! ```no_run
//! use chat_relay_redis::RedisRecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisRecordStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

use chat_relay_core::record::{RequestId, RequestRecord};
use chat_relay_core::store::{RecordStore, Result, StoreError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "chat:request:";

/// `Redis`-based record store.
///
/// This type is `Clone`; clones share the same `ConnectionManager`.
#[derive(Clone)]
pub struct RedisRecordStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisRecordStore {
    /// Connect to `Redis`.
    ///
    /// # Connection URL Format
    ///
    /// - TCP: `redis://[:password@]host[:port][/database]`
    /// - TLS: `rediss://[:password@]host[:port][/database]`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the URL is malformed or the
    /// server cannot be reached.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisRecordStore initialized successfully");

        Ok(Self {
            conn_manager,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    /// Use a different key namespace (e.g. to share one `Redis` between deployments).
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Active key namespace.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn record_key(&self, id: &RequestId) -> String {
        format!("{}{id}", self.key_prefix)
    }

    fn decode(bytes: Option<Vec<u8>>) -> Result<Option<RequestRecord>> {
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

impl std::fmt::Debug for RedisRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRecordStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RecordStore for RedisRecordStore {
    async fn get(&self, id: &RequestId) -> Result<Option<RequestRecord>> {
        let mut conn = self.conn_manager.clone();

        let bytes: Option<Vec<u8>> = conn
            .get(self.record_key(id))
            .await
            .map_err(|e| StoreError::Command(format!("Failed to read record: {e}")))?;

        Self::decode(bytes)
    }

    async fn set_with_ttl(&self, id: &RequestId, record: RequestRecord, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let bytes =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // SETEX granularity is one second
        let ttl_seconds = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(self.record_key(id), bytes, ttl_seconds)
            .await
            .map_err(|e| StoreError::Command(format!("Failed to store record: {e}")))?;

        tracing::debug!(
            request_id = %id,
            status = %record.status,
            ttl_seconds = ttl_seconds,
            "Stored record in Redis"
        );

        Ok(())
    }

    async fn delete(&self, id: &RequestId) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(self.record_key(id))
            .await
            .map_err(|e| StoreError::Command(format!("Failed to delete record: {e}")))?;

        Ok(())
    }

    async fn take(&self, id: &RequestId) -> Result<Option<RequestRecord>> {
        let mut conn = self.conn_manager.clone();

        // GETDEL: concurrent takers cannot both observe the record
        let bytes: Option<Vec<u8>> = conn
            .get_del(self.record_key(id))
            .await
            .map_err(|e| StoreError::Command(format!("Failed to take record: {e}")))?;

        Self::decode(bytes)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(format!("Redis did not answer PING: {e}")))?;

        Ok(())
    }
}
