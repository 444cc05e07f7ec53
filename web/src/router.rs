//! Route table.
//!
//! ```text
//! GET  /health                          liveness
//! GET  /ready                           store ping
//! GET  /metrics                         Prometheus exposition
//! POST /api/chat/start                  dispatch
//! POST /api/chat/callback               webhook result
//! GET  /api/chat/result/:request_id     poll
//! *    (fallback)                       static assets
//! ```

use crate::handlers::{chat, health};
use crate::metrics::metrics_handler;
use crate::middleware::trace_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use chat_relay_core::relay::CALLBACK_PATH;
use chat_relay_core::store::RecordStore;
use chat_relay_core::webhook::Webhook;
use std::path::PathBuf;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Router settings outside the relay itself.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Origins allowed by CORS. Empty, or containing `*`, allows any origin.
    pub allowed_origins: Vec<String>,
    /// Directory served for unmatched paths; `None` disables static serving.
    pub static_dir: Option<PathBuf>,
}

/// Build the application router.
///
/// # Example
///
/// ```ignore
/// let app = build_router(AppState::new(relay), RouterConfig::default());
/// axum::serve(listener, app).await?;
/// ```
pub fn build_router<S, W>(state: AppState<S, W>, config: &RouterConfig) -> Router
where
    S: RecordStore + 'static,
    W: Webhook + 'static,
{
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check::<S, W>))
        .route("/metrics", get(metrics_handler::<S, W>))
        .route("/api/chat/start", post(chat::start_chat::<S, W>))
        .route(CALLBACK_PATH, post(chat::chat_callback::<S, W>))
        .route("/api/chat/result/:request_id", get(chat::chat_result::<S, W>))
        .with_state(state);

    if let Some(dir) = &config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(trace_id_layer())
}

/// CORS policy for the given origins.
///
/// Origins that are not valid header values are skipped with a warning.
#[must_use]
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
