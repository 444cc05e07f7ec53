//! Custom Axum extractors.
//!
//! - `ClientIdHeader`: caller identity from the `X-Client-ID` header
//! - `RequestOrigin`: the scheme and host the client used to reach us
//! - `CallbackSignature`: the `X-Callback-Signature` header
//!
//! None of these reject; absent headers extract as `None` or a default.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

/// Header a client may use to identify itself.
pub const CLIENT_ID_HEADER: &str = "X-Client-ID";

/// Header a webhook may use to carry its callback signature.
pub const CALLBACK_SIGNATURE_HEADER: &str = "X-Callback-Signature";

/// Client id from the `X-Client-ID` header, if present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdHeader(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIdHeader
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_str(&parts.headers, CLIENT_ID_HEADER)))
    }
}

/// Signature from the `X-Callback-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSignature(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for CallbackSignature
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_str(&parts.headers, CALLBACK_SIGNATURE_HEADER)))
    }
}

/// Base URL the client used, e.g. `https://relay.example.com`.
///
/// # Priority
///
/// - Scheme: `X-Forwarded-Proto`, else `http`
/// - Host: `X-Forwarded-Host`, else `Host`, else `localhost`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(pub String);

impl RequestOrigin {
    /// The origin as a URL prefix with no trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(origin_from_headers(&parts.headers)))
    }
}

fn origin_from_headers(headers: &HeaderMap) -> String {
    let scheme = header_str(headers, "X-Forwarded-Proto")
        .and_then(|value| value.split(',').next().map(|s| s.trim().to_string()))
        .unwrap_or_else(|| "http".to_string());

    let host = header_str(headers, "X-Forwarded-Host")
        .or_else(|| header_str(headers, "Host"))
        .unwrap_or_else(|| "localhost".to_string());

    format!("{scheme}://{host}")
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_origin_defaults_to_http() {
        let origin = origin_from_headers(&headers(&[("host", "relay.example.com")]));
        assert_eq!(origin, "http://relay.example.com");
    }

    #[test]
    fn test_origin_honors_forwarded_headers() {
        let origin = origin_from_headers(&headers(&[
            ("host", "10.0.0.5:3000"),
            ("x-forwarded-proto", "https, http"),
            ("x-forwarded-host", "relay.example.com"),
        ]));
        assert_eq!(origin, "https://relay.example.com");
    }

    #[test]
    fn test_origin_without_host() {
        assert_eq!(origin_from_headers(&HeaderMap::new()), "http://localhost");
    }

    #[test]
    fn test_blank_header_is_absent() {
        let map = headers(&[("x-client-id", "   ")]);
        assert_eq!(header_str(&map, CLIENT_ID_HEADER), None);
    }
}
