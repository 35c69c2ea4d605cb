//! Request handling and transformation.
//!
//! # Responsibilities
//! - Extract routing-relevant information (host, path)
//! - Capture where the request came from before it is rewritten
//! - Prepare request headers for forwarding to a backend
//!
//! # Design Decisions
//! - Hop-by-hop headers never cross the proxy
//! - X-Forwarded-For is appended to, never replaced
//! - X-Forwarded-Host and X-Forwarded-Proto describe this hop only

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};

use crate::http::response::strip_hop_by_hop;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Where an inbound request came from.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    /// Peer address of the client connection, when known.
    pub client_addr: Option<SocketAddr>,

    /// Inbound Host, as sent by the client (port included).
    pub host: Option<HeaderValue>,

    /// `http` or `https`, depending on how the front door is serving.
    pub proto: &'static str,
}

impl Origin {
    /// Capture the origin of `request` before it is modified.
    pub fn of(request: &Request<Body>, proto: &'static str) -> Self {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let host = request.headers().get(header::HOST).cloned().or_else(|| {
            request
                .uri()
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });

        Self {
            client_addr,
            host,
            proto,
        }
    }

    /// Host as a string for rule matching. Empty when absent or not text.
    pub fn host_str(&self) -> &str {
        self.host
            .as_ref()
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
    }
}

/// Strip hop-by-hop headers and set the X-Forwarded-* headers.
pub fn prepare_upstream_headers(headers: &mut HeaderMap, origin: &Origin) {
    strip_hop_by_hop(headers);

    if let Some(addr) = origin.client_addr {
        let client_ip = addr.ip().to_string();
        let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.is_empty() => format!("{prior}, {client_ip}"),
            _ => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    match &origin.host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
        None => {
            headers.remove(X_FORWARDED_HOST);
        }
    }

    if !origin.proto.is_empty() {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(origin.proto));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_reads_connect_info_and_host() {
        let mut request = Request::builder()
            .uri("/x")
            .header(header::HOST, "proxy.example.net:8080")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 4000))));

        let origin = Origin::of(&request, "https");
        assert_eq!(origin.client_addr.unwrap().port(), 4000);
        assert_eq!(origin.host_str(), "proxy.example.net:8080");
        assert_eq!(origin.proto, "https");
    }

    #[test]
    fn origin_falls_back_to_uri_authority() {
        let request = Request::builder()
            .uri("http://h2.example.com/x")
            .body(Body::empty())
            .unwrap();

        let origin = Origin::of(&request, "http");
        assert_eq!(origin.host_str(), "h2.example.com");
        assert!(origin.client_addr.is_none());
    }

    #[test]
    fn forwarded_for_is_appended() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        headers.insert(header::TE, HeaderValue::from_static("trailers"));

        let origin = Origin {
            client_addr: Some(SocketAddr::from(([10, 1, 1, 1], 1234))),
            host: Some(HeaderValue::from_static("site.example")),
            proto: "http",
        };
        prepare_upstream_headers(&mut headers, &origin);

        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.9, 10.1.1.1");
        assert_eq!(headers[X_FORWARDED_HOST], "site.example");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
        assert!(headers.get(header::TE).is_none());
    }
}
