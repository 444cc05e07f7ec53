//! Record store trait.
//!
//! This module defines the key-value abstraction the relay keeps its request
//! records in. Every write carries a TTL; records the store has expired are
//! indistinguishable from records that never existed.
//!
//! # Implementations
//!
//! - [`memory::InMemoryRecordStore`]: single-process store driven by an injected clock
//! - `chat_relay_redis::RedisRecordStore`: shared `Redis` store (separate crate)

use crate::record::{RequestId, RequestRecord};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryRecordStore;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from record store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing service could not be reached.
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// The backing service rejected or failed a command.
    #[error("Store command failed: {0}")]
    Command(String),

    /// A stored record could not be encoded or decoded.
    #[error("Record serialization failed: {0}")]
    Serialization(String),
}

/// TTL-keyed storage for request records.
///
/// # Implementation Notes
///
/// - `set_with_ttl()` replaces any existing record and restarts its TTL
/// - **CRITICAL**: `take()` MUST be atomic (`Redis` GETDEL, or a mutex-guarded
///   remove in memory). It is what guarantees single delivery of a result when
///   several pollers race for the same id.
/// - Expired records must never be returned
pub trait RecordStore: Send + Sync {
    /// Fetch a record without removing it.
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails or the record cannot be decoded.
    fn get(
        &self,
        id: &RequestId,
    ) -> impl Future<Output = Result<Option<RequestRecord>>> + Send;

    /// Write a record, replacing any existing one, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails or the record cannot be encoded.
    fn set_with_ttl(
        &self,
        id: &RequestId,
        record: RequestRecord,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a record. Deleting a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails.
    fn delete(&self, id: &RequestId) -> impl Future<Output = Result<()>> + Send;

    /// Atomically fetch and delete a record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: the record existed and this caller removed it
    /// - `Ok(None)`: absent, expired, or already taken by another caller
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails or the record cannot be decoded.
    fn take(
        &self,
        id: &RequestId,
    ) -> impl Future<Output = Result<Option<RequestRecord>>> + Send;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns error if the backing service does not answer.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}
