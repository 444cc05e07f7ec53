//! Axum front door for Chat Relay.
//!
//! Translates HTTP into calls on [`chat_relay_core::Relay`] and relay
//! results back into HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Axum (this crate)          │  ← JSON, headers, CORS
//! │  - Request parsing                      │  ← Trace ids, metrics
//! │  - Response serialization               │  ← Static assets
//! ├─────────────────────────────────────────┤
//! │              Relay (core)               │
//! │  - Dispatch / complete / poll           │  ← Store + webhook traits
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chat_relay_web::{AppState, RouterConfig, build_router};
//!
//! let app = build_router(AppState::new(relay), &RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CallbackSignature, ClientIdHeader, RequestOrigin};
pub use middleware::{TRACE_ID_HEADER, TraceIdExt, trace_id_layer};
pub use router::{RouterConfig, build_router, cors_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
