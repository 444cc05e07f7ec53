//! The relay service.
//!
//! Ties the three operations together:
//!
//! 1. **Dispatch**: record `processing`, forward to the webhook, clean up on failure
//! 2. **Complete**: the webhook's callback stores the result as `completed`
//! 3. **Poll**: clients fetch the result; a completed result is delivered once
//!
//! All I/O goes through the injected [`RecordStore`] and [`Webhook`]; time and
//! ids come from the [`Clock`] and [`IdGenerator`] in the environment.

use crate::environment::{Clock, IdGenerator};
use crate::record::{RequestId, RequestRecord, RequestStatus};
use crate::signing::{CallbackSigner, SIGNATURE_PARAM};
use crate::store::{RecordStore, StoreError};
use crate::webhook::{Webhook, WebhookError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Path the webhook posts results back to.
pub const CALLBACK_PATH: &str = "/api/chat/callback";

/// Client id used when the caller does not identify itself.
pub const ANONYMOUS_CLIENT: &str = "anon";

/// Default record time-to-live (1 hour).
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(3600);

/// Errors from relay operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// No webhook URL was configured.
    #[error("Webhook URL is not configured")]
    MissingConfiguration,

    /// The webhook was unreachable or rejected the request.
    #[error("Upstream webhook failed: {0}")]
    Upstream(#[from] WebhookError),

    /// The initial `processing` record could not be written.
    #[error("Request could not be recorded: {0}")]
    Dispatch(StoreError),

    /// The record store failed.
    #[error("Record store failed: {0}")]
    Store(#[from] StoreError),

    /// The callback body is missing required fields.
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    /// The callback signature is missing or wrong.
    #[error("Callback signature is missing or invalid")]
    UnauthorizedCallback,

    /// Strict mode: the callback names a request that has no live record.
    #[error("Unknown request {0}")]
    UnknownRequest(RequestId),
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Record time-to-live, restarted on every write.
    ///
    /// Default: 1 hour
    pub record_ttl: Duration,

    /// Reject callbacks for ids with no live record.
    ///
    /// Default: `false` (callbacks for unknown ids create a completed record)
    pub strict_callbacks: bool,

    /// Shared secret for signed callback URLs. `None` disables verification.
    pub callback_secret: Option<String>,
}

impl RelayConfig {
    /// Create configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            record_ttl: DEFAULT_RECORD_TTL,
            strict_callbacks: false,
            callback_secret: None,
        }
    }

    /// Set record time-to-live.
    #[must_use]
    pub const fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Enable or disable strict callback checking.
    #[must_use]
    pub const fn with_strict_callbacks(mut self, strict: bool) -> Self {
        self.strict_callbacks = strict;
        self
    }

    /// Require signed callbacks using `secret`.
    #[must_use]
    pub fn with_callback_secret(mut self, secret: impl Into<String>) -> Self {
        self.callback_secret = Some(secret.into());
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Injected dependencies of the relay.
pub struct RelayEnvironment<S, W> {
    /// Record storage.
    pub store: S,
    /// Outbound webhook; `None` when not configured.
    pub webhook: Option<W>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Request id source.
    pub ids: Arc<dyn IdGenerator>,
}

impl<S, W> RelayEnvironment<S, W> {
    /// Bundle the relay's dependencies.
    #[must_use]
    pub fn new(
        store: S,
        webhook: Option<W>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            webhook,
            clock,
            ids,
        }
    }
}

/// A client request to relay.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Caller identity (`anon` when unknown).
    pub client_id: String,
    /// Client body, passed through to the webhook.
    pub payload: Value,
    /// Externally reachable base URL of this service, e.g. `https://relay.example.com`.
    pub callback_base: String,
}

impl DispatchRequest {
    /// Create a dispatch request.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        payload: Value,
        callback_base: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            payload,
            callback_base: callback_base.into(),
        }
    }
}

/// Body the webhook posts to the callback endpoint.
///
/// All fields are optional on the wire so that missing fields surface as
/// [`RelayError::InvalidCallback`] rather than a decoding error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    /// Request the result belongs to.
    #[serde(rename = "requestID")]
    pub request_id: Option<String>,

    /// Client the request was made for.
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,

    /// Result text.
    pub text: Option<String>,
}

impl CallbackPayload {
    fn validate(self) -> Result<(RequestId, String, String), RelayError> {
        let request_id = self
            .request_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RelayError::InvalidCallback("requestID is required".to_string()))?;
        let client_id = self
            .client_id
            .ok_or_else(|| RelayError::InvalidCallback("clientId is required".to_string()))?;
        let text = self
            .text
            .ok_or_else(|| RelayError::InvalidCallback("text is required".to_string()))?;

        Ok((RequestId::new(request_id), client_id, text))
    }
}

/// Result of polling for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still waiting for the callback.
    Processing,
    /// Result delivered; the record has been deleted.
    Completed(Value),
    /// Unknown, expired, or already delivered.
    NotFound,
}

/// The request relay.
pub struct Relay<S, W> {
    env: RelayEnvironment<S, W>,
    config: RelayConfig,
    signer: Option<CallbackSigner>,
}

impl<S, W> Relay<S, W>
where
    S: RecordStore,
    W: Webhook,
{
    /// Create a relay over the given environment.
    #[must_use]
    pub fn new(env: RelayEnvironment<S, W>, config: RelayConfig) -> Self {
        let signer = config.callback_secret.as_deref().map(CallbackSigner::new);
        Self {
            env,
            config,
            signer,
        }
    }

    /// Accept a client request and forward it to the webhook.
    ///
    /// The `processing` record is written before the webhook is contacted and
    /// removed again if forwarding fails, so a failed dispatch leaves nothing
    /// behind (a failed removal is logged; the record then expires by TTL).
    ///
    /// # Errors
    ///
    /// - [`RelayError::MissingConfiguration`] if no webhook is configured
    /// - [`RelayError::Dispatch`] if the record cannot be written
    /// - [`RelayError::Upstream`] if the webhook is unreachable or rejects the request
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<RequestId, RelayError> {
        let Some(webhook) = &self.env.webhook else {
            tracing::error!("Dispatch attempted without a configured webhook URL");
            metrics::counter!("relay_dispatch_total", "outcome" => "misconfigured").increment(1);
            return Err(RelayError::MissingConfiguration);
        };

        let now = self.env.clock.now();
        let request_id = self.env.ids.next_id(now);

        self.env
            .store
            .set_with_ttl(&request_id, RequestRecord::processing(now), self.config.record_ttl)
            .await
            .map_err(|e| {
                tracing::error!(request_id = %request_id, error = %e, "Failed to record dispatched request");
                metrics::counter!("relay_dispatch_total", "outcome" => "store_error").increment(1);
                RelayError::Dispatch(e)
            })?;

        let callback_url = self.callback_url(&request.callback_base, &request_id);
        let payload = forward_payload(request.payload, &request.client_id, &request_id, &callback_url);

        let started = std::time::Instant::now();
        let forwarded = webhook.forward(&payload).await;
        metrics::histogram!("relay_webhook_duration_seconds").record(started.elapsed().as_secs_f64());

        match forwarded {
            Ok(()) => {
                tracing::info!(
                    request_id = %request_id,
                    client_id = %request.client_id,
                    "Request forwarded to webhook"
                );
                metrics::counter!("relay_dispatch_total", "outcome" => "accepted").increment(1);
                Ok(request_id)
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Webhook did not accept request");

                if let Err(cleanup) = self.env.store.delete(&request_id).await {
                    tracing::error!(
                        request_id = %request_id,
                        error = %cleanup,
                        "Failed to remove record of failed dispatch (left to TTL)"
                    );
                }

                metrics::counter!("relay_dispatch_total", "outcome" => "upstream_error").increment(1);
                Err(RelayError::Upstream(e))
            }
        }
    }

    /// Store the webhook's result for a request.
    ///
    /// A later callback for the same id overwrites the earlier one.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidCallback`] if a field is missing
    /// - [`RelayError::UnauthorizedCallback`] if signing is enabled and `signature` does not match
    /// - [`RelayError::UnknownRequest`] in strict mode when no record exists
    /// - [`RelayError::Store`] if the store fails
    pub async fn complete(
        &self,
        callback: CallbackPayload,
        signature: Option<&str>,
    ) -> Result<RequestId, RelayError> {
        let (request_id, client_id, text) = callback.validate().inspect_err(|_| {
            metrics::counter!("relay_callback_total", "outcome" => "invalid").increment(1);
        })?;

        if let Some(signer) = &self.signer {
            let verified = signature.is_some_and(|sig| signer.verify(&request_id, sig));
            if !verified {
                tracing::warn!(request_id = %request_id, "Rejected callback with bad signature");
                metrics::counter!("relay_callback_total", "outcome" => "unauthorized").increment(1);
                return Err(RelayError::UnauthorizedCallback);
            }
        }

        if self.config.strict_callbacks && self.env.store.get(&request_id).await?.is_none() {
            tracing::warn!(request_id = %request_id, "Rejected callback for unknown request");
            metrics::counter!("relay_callback_total", "outcome" => "unknown").increment(1);
            return Err(RelayError::UnknownRequest(request_id));
        }

        let record = RequestRecord::completed(
            json!({ "text": text, "clientId": client_id }),
            self.env.clock.now(),
        );

        self.env
            .store
            .set_with_ttl(&request_id, record, self.config.record_ttl)
            .await
            .inspect_err(|e| {
                tracing::error!(request_id = %request_id, error = %e, "Failed to store callback result");
                metrics::counter!("relay_callback_total", "outcome" => "store_error").increment(1);
            })?;

        tracing::info!(request_id = %request_id, client_id = %client_id, "Callback result stored");
        metrics::counter!("relay_callback_total", "outcome" => "completed").increment(1);

        Ok(request_id)
    }

    /// Look up a request; a completed result is removed as it is returned.
    ///
    /// Removal uses the store's atomic take, so when several pollers race for
    /// the same completed record exactly one receives it and the others see
    /// [`PollOutcome::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the store fails.
    pub async fn poll(&self, request_id: &RequestId) -> Result<PollOutcome, RelayError> {
        let outcome = match self.env.store.get(request_id).await? {
            None => PollOutcome::NotFound,
            Some(record) if record.status == RequestStatus::Processing => PollOutcome::Processing,
            Some(_) => match self.env.store.take(request_id).await? {
                Some(taken) => {
                    tracing::info!(request_id = %request_id, "Result delivered");
                    PollOutcome::Completed(taken.data.unwrap_or(Value::Null))
                }
                None => PollOutcome::NotFound,
            },
        };

        let label = match outcome {
            PollOutcome::Processing => "processing",
            PollOutcome::Completed(_) => "delivered",
            PollOutcome::NotFound => "not_found",
        };
        metrics::counter!("relay_poll_total", "outcome" => label).increment(1);

        Ok(outcome)
    }

    /// Check the record store.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the store does not answer.
    pub async fn ping(&self) -> Result<(), RelayError> {
        self.env.store.ping().await.map_err(RelayError::Store)
    }

    fn callback_url(&self, base: &str, request_id: &RequestId) -> String {
        let url = format!("{}{CALLBACK_PATH}", base.trim_end_matches('/'));
        match &self.signer {
            Some(signer) => format!("{url}?{SIGNATURE_PARAM}={}", signer.sign(request_id)),
            None => url,
        }
    }
}

/// Client body with `clientId`, `requestID` and `callbackURL` injected.
///
/// Non-object bodies are wrapped as `{"input": body}` first.
fn forward_payload(
    payload: Value,
    client_id: &str,
    request_id: &RequestId,
    callback_url: &str,
) -> Value {
    let mut object = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    };

    object.insert("clientId".to_string(), Value::String(client_id.to_string()));
    object.insert("requestID".to_string(), Value::String(request_id.to_string()));
    object.insert("callbackURL".to_string(), Value::String(callback_url.to_string()));

    Value::Object(object)
}
