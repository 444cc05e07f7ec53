//! Request records and their identifiers.
//!
//! A [`RequestRecord`] is the only persisted entity. It is created in the
//! `processing` state when a request is dispatched, moves to `completed` when
//! the webhook calls back, and is deleted on delivery or by TTL expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation id linking a dispatch to its callback and polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Status of a relayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Forwarded to the webhook, no result yet.
    Processing,
    /// The webhook called back with a result.
    Completed,
}

impl RequestStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state of one relayed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Current status.
    pub status: RequestStatus,

    /// Result data, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Time of the last write.
    pub timestamp: DateTime<Utc>,
}

impl RequestRecord {
    /// A freshly dispatched request.
    #[must_use]
    pub const fn processing(timestamp: DateTime<Utc>) -> Self {
        Self {
            status: RequestStatus::Processing,
            data: None,
            timestamp,
        }
    }

    /// A request whose result has arrived.
    #[must_use]
    pub const fn completed(data: serde_json::Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: RequestStatus::Completed,
            data: Some(data),
            timestamp,
        }
    }

    /// Whether the result is ready for delivery.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }
}
