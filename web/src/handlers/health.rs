//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chat_relay_core::store::RecordStore;
use chat_relay_core::webhook::Webhook;
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check the record store.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness check response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Record store connectivity
    pub store: bool,
}

/// Readiness check endpoint.
///
/// Pings the record store.
///
/// # Status Codes
///
/// - 200 OK: store answered
/// - 503 Service Unavailable: store did not answer
///
/// # Errors
///
/// Returns [`AppError::unavailable`] when the store ping fails.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/ready
/// # {"ready":true,"store":true}
/// ```
pub async fn readiness_check<S, W>(
    State(state): State<AppState<S, W>>,
) -> WebResult<Json<ReadinessResponse>>
where
    S: RecordStore,
    W: Webhook,
{
    state.relay.ping().await.map_err(|e| {
        AppError::unavailable("Record store unavailable").with_source(anyhow::Error::new(e))
    })?;

    Ok(Json(ReadinessResponse {
        ready: true,
        store: true,
    }))
}
