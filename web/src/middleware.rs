//! Request tracing middleware.
//!
//! Every request gets a trace id: taken from the incoming `X-Trace-ID` header
//! when it is a valid UUID, generated otherwise. The id is stored in request
//! extensions, recorded on an `http_request` span, and echoed back on the
//! response.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use chat_relay_web::middleware::trace_id_layer;
//!
//! let app = Router::new()
//!     .route("/health", get(health_check))
//!     .layer(trace_id_layer());
//! ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "X-Trace-ID";

/// Create a layer that attaches a trace id to every request and response.
#[must_use]
pub const fn trace_id_layer() -> TraceIdLayer {
    TraceIdLayer
}

/// Layer for trace id tracking.
#[derive(Clone, Debug)]
pub struct TraceIdLayer;

impl<S> Layer<S> for TraceIdLayer {
    type Service = TraceIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceIdMiddleware { inner }
    }
}

/// Middleware service for trace id tracking.
#[derive(Clone, Debug)]
pub struct TraceIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for TraceIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let trace_id = req
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(TraceId(trace_id));

        let span = tracing::info_span!(
            "http_request",
            trace_id = %trace_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span.clone()).await?;

            span.in_scope(|| {
                tracing::debug!(status = %response.status(), "Request completed");
            });

            if let Ok(header_value) = HeaderValue::from_str(&trace_id.to_string()) {
                response.headers_mut().insert(TRACE_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// Trace id stored in request extensions by [`TraceIdLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId(pub Uuid);

/// Read the trace id from request extensions.
pub trait TraceIdExt {
    /// The trace id, or `None` if [`trace_id_layer`] is not installed.
    fn trace_id(&self) -> Option<Uuid>;
}

impl<B> TraceIdExt for axum::http::Request<B> {
    fn trace_id(&self) -> Option<Uuid> {
        self.extensions().get::<TraceId>().map(|id| id.0)
    }
}
