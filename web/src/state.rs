//! Application state for Axum handlers.

use chat_relay_core::relay::Relay;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State shared by all handlers.
///
/// Generic over the relay's store and webhook so that tests can wire an
/// in-memory store and a mock webhook into the real router.
///
/// # Examples
///
/// ```ignore
/// async fn handler<S: RecordStore, W: Webhook>(
///     State(state): State<AppState<S, W>>,
/// ) -> Result<Json<Response>, AppError> {
///     state.relay.ping().await?;
///     Ok(Json(response))
/// }
/// ```
pub struct AppState<S, W> {
    /// The relay.
    pub relay: Arc<Relay<S, W>>,
    /// Externally reachable base URL; overrides the request's own origin
    /// when building callback URLs.
    pub public_url: Option<String>,
    /// Prometheus handle; `None` disables `/metrics`.
    pub metrics: Option<PrometheusHandle>,
}

impl<S, W> AppState<S, W> {
    /// Create state around a relay.
    #[must_use]
    pub fn new(relay: Relay<S, W>) -> Self {
        Self {
            relay: Arc::new(relay),
            public_url: None,
            metrics: None,
        }
    }

    /// Set the public base URL used for callbacks.
    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    /// Serve metrics from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Base URL for callbacks: the configured public URL, else `origin`.
    #[must_use]
    pub fn callback_base(&self, origin: &str) -> String {
        self.public_url
            .as_deref()
            .unwrap_or(origin)
            .trim_end_matches('/')
            .to_string()
    }
}

// Manual impl: `derive` would require `S: Clone` and `W: Clone`.
impl<S, W> Clone for AppState<S, W> {
    fn clone(&self) -> Self {
        Self {
            relay: Arc::clone(&self.relay),
            public_url: self.public_url.clone(),
            metrics: self.metrics.clone(),
        }
    }
}
