//! Prometheus metrics.
//!
//! The relay records counters through the `metrics` facade; this module
//! installs the Prometheus recorder and serves its output at `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use chat_relay_web::metrics::install_recorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install_recorder()?;
//! println!("{}", handle.render());
//! # Ok(())
//! # }
//! ```

use crate::state::AppState;
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Describe relay metrics and install the global Prometheus recorder.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = builder()?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!("Prometheus metrics recorder installed");

    Ok(handle)
}

/// A recorder handle that is not installed globally.
///
/// Useful for serving `/metrics` in tests without touching global state.
///
/// # Errors
///
/// Returns [`MetricsError::Build`] if the exporter cannot be configured.
pub fn detached_handle() -> Result<PrometheusHandle, MetricsError> {
    Ok(builder()?.build_recorder().handle())
}

fn builder() -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))
}

fn register_metrics() {
    describe_counter!(
        "relay_dispatch_total",
        "Client requests received, labelled by outcome"
    );
    describe_counter!(
        "relay_callback_total",
        "Webhook callbacks received, labelled by outcome"
    );
    describe_counter!("relay_poll_total", "Result polls, labelled by outcome");
    describe_histogram!(
        "relay_webhook_duration_seconds",
        "Time taken by the webhook to acknowledge a forwarded request"
    );
}

/// `GET /metrics`: Prometheus text format, or 404 when metrics are disabled.
pub async fn metrics_handler<S, W>(State(state): State<AppState<S, W>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
