//! Outbound webhook.
//!
//! The relay forwards each accepted request to an external workflow webhook.
//! The webhook acknowledges with `200 OK` or `202 Accepted`; anything else,
//! and any transport failure, is an upstream failure.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from forwarding a request to the webhook.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Connection failure, timeout, or other transport error.
    #[error("Webhook unreachable: {0}")]
    Unreachable(String),

    /// The webhook answered with a status other than 200/202.
    #[error("Webhook rejected request with status {status}")]
    Rejected {
        /// HTTP status returned by the webhook
        status: u16,
    },

    /// The HTTP client could not be constructed.
    #[error("Webhook client could not be built: {0}")]
    Client(String),
}

/// External endpoint that performs the processing and calls back later.
pub trait Webhook: Send + Sync {
    /// Forward `payload` to the webhook.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Unreachable`] on transport failure and
    /// [`WebhookError::Rejected`] when the webhook does not accept the request.
    fn forward(
        &self,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<(), WebhookError>> + Send;
}

/// Webhook reached over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpWebhook {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhook {
    /// Create a webhook client posting JSON to `url`.
    ///
    /// `timeout` bounds the whole request, connection included.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Client`] if the TLS backend cannot be initialized.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Webhook for HttpWebhook {
    async fn forward(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            tracing::debug!(url = %self.url, status = %status, "Webhook accepted request");
            Ok(())
        } else {
            Err(WebhookError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
