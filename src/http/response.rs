//! Response handling and transformation.
//!
//! # Responsibilities
//! - Stamp backend responses with the proxy identity headers
//! - Remove hop-by-hop headers
//! - Map routing and forwarding failures to HTTP status codes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Failures are plain text; configuration problems are never shown to clients

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::upstream::connector::ForwardError;

pub const X_PROXY: HeaderName = HeaderName::from_static("x-proxy");
pub const X_PROXY_INSTANCE: HeaderName = HeaderName::from_static("x-proxy-instance");

/// Product tag sent in `X-Proxy`.
pub const PROXY_NAME: &str = "RelayProxy";

/// Headers that apply to a single connection and are never forwarded.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

/// Identity headers added to every forwarded response.
#[derive(Debug, Clone)]
pub struct ResponseStamp {
    proxy: HeaderValue,
    instance: HeaderValue,
}

impl ResponseStamp {
    pub fn new(instance: &str) -> Self {
        let proxy = format!("{}/{}", PROXY_NAME, env!("CARGO_PKG_VERSION"));
        Self {
            proxy: HeaderValue::from_str(&proxy).unwrap_or(HeaderValue::from_static(PROXY_NAME)),
            instance: HeaderValue::from_str(instance)
                .unwrap_or(HeaderValue::from_static("unknown")),
        }
    }

    /// Stamp identifying the machine this process runs on.
    pub fn for_this_host() -> Self {
        let instance = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self::new(&instance)
    }

    /// Set `X-Proxy` and `X-Proxy-Instance`. Nothing else is touched.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_PROXY, self.proxy.clone());
        headers.insert(X_PROXY_INSTANCE, self.instance.clone());
    }
}

/// Per-request routing failures.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("No matching rule for host & path")]
    NoRuleMatched,

    #[error("upstream '{0}' not found")]
    UpstreamNotFound(String),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRuleMatched => StatusCode::NOT_FOUND,
            ProxyError::UpstreamNotFound(_) | ProxyError::Forward(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            ProxyError::NoRuleMatched => "No matching rule for host & path",
            ProxyError::UpstreamNotFound(_) => "Upstream not configured",
            ProxyError::Forward(_) => "Upstream request failed",
        };
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_sets_only_identity_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(X_PROXY, HeaderValue::from_static("someone-else"));

        ResponseStamp::new("node-1").apply(&mut headers);

        assert_eq!(
            headers[X_PROXY],
            format!("RelayProxy/{}", env!("CARGO_PKG_VERSION")).as_str()
        );
        assert_eq!(headers[X_PROXY_INSTANCE], "node-1");
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn connection_listed_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-internal"));
        headers.insert("x-internal", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn errors_map_to_status() {
        assert_eq!(ProxyError::NoRuleMatched.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxyError::UpstreamNotFound("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
