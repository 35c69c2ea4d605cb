//! Upstream connector.
//!
//! # Responsibilities
//! - Hold one fixed backend base address (scheme + authority)
//! - Rewrite inbound requests onto that address and forward them
//! - Bound the connect phase and the wait for the response
//! - Apply the backend TLS policy
//! - Stamp forwarded responses with the proxy identity headers
//!
//! # Design Decisions
//! - One HTTP client (and so one connection pool) per upstream
//! - Connectors are plain data behind the [`Connector`] trait; nothing is
//!   captured from the environment at forward time
//! - Outbound requests are always HTTP/1.1, whatever the inbound version

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::schema::{ServerSettings, Upstream};
use crate::http::request::{prepare_upstream_headers, Origin};
use crate::http::response::{strip_hop_by_hop, ResponseStamp};
use crate::upstream::timeout::HandshakeTimeout;
use crate::upstream::tls;

/// Error building a connector. Any of these rejects the whole configuration.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("upstream '{name}' has an invalid target '{target}': {reason}")]
    InvalidTarget {
        name: String,
        target: String,
        reason: String,
    },

    #[error("upstream '{name}' TLS setup failed: {source}")]
    Tls {
        name: String,
        #[source]
        source: rustls::Error,
    },
}

/// Error forwarding one request.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// True when no connection to the backend could be established.
    pub fn is_connect(&self) -> bool {
        matches!(self, ForwardError::Upstream(e) if e.is_connect())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Timeout(_))
    }
}

/// Per-process options shared by every connector.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    /// Bound on the TCP connect plus the TLS handshake to the backend.
    pub connect_timeout: Duration,

    /// Bound on the whole exchange, from dispatch to response headers.
    pub response_timeout: Duration,

    /// Accept any certificate from https upstreams.
    pub tls_skip_verify: bool,

    /// Forward the inbound Host header instead of the upstream authority.
    pub preserve_host: bool,

    pub stamp: ResponseStamp,
}

impl ConnectorOptions {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            connect_timeout: settings.timeout,
            response_timeout: settings.timeout,
            tls_skip_verify: settings.tls_skip_verify,
            preserve_host: settings.preserve_host,
            stamp: ResponseStamp::for_this_host(),
        }
    }
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

/// A forwarding unit bound to one backend.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Upstream name this connector serves.
    fn name(&self) -> &str;

    /// Base address, for logs and metrics.
    fn target(&self) -> &str;

    /// Send the request to the backend and return its response.
    ///
    /// The request path must already be in its final form.
    async fn forward(
        &self,
        request: Request<Body>,
        origin: &Origin,
    ) -> Result<Response<Body>, ForwardError>;

    /// Add the proxy identity headers to a backend response.
    fn stamp(&self, response: &mut Response<Body>);
}

/// HTTP(S) connector for one configured upstream.
pub struct UpstreamConnector {
    name: String,
    base_url: String,
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    preserve_host: bool,
    stamp: ResponseStamp,
    response_timeout: Duration,
    client: Client<HandshakeTimeout<HttpsConnector<HttpConnector>>, Body>,
}

impl UpstreamConnector {
    /// Build a connector for `upstream`. The scheme must already be validated.
    pub fn build(upstream: &Upstream, options: &ConnectorOptions) -> Result<Self, ConnectorError> {
        let base_url = upstream.base_url();
        let invalid = |reason: String| ConnectorError::InvalidTarget {
            name: upstream.name.clone(),
            target: base_url.clone(),
            reason,
        };

        if upstream.host.is_empty() {
            return Err(invalid("host is empty".to_string()));
        }

        let scheme = match upstream.effective_scheme() {
            "https" => Scheme::HTTPS,
            _ => Scheme::HTTP,
        };
        let authority = Authority::from_str(&format!(
            "{}:{}",
            upstream.host,
            upstream.effective_port()
        ))
        .map_err(|e| invalid(e.to_string()))?;
        let host_header =
            HeaderValue::from_str(authority.as_str()).map_err(|e| invalid(e.to_string()))?;

        let tls_config =
            tls::client_config(options.tls_skip_verify).map_err(|source| ConnectorError::Tls {
                name: upstream.name.clone(),
                source,
            })?;
        if options.tls_skip_verify && scheme == Scheme::HTTPS {
            tracing::warn!(
                upstream = %upstream.name,
                "TLS certificate verification disabled for upstream"
            );
        }

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);
        let connector = HandshakeTimeout::new(https, options.connect_timeout);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        tracing::info!(upstream = %upstream.name, target = %base_url, "Creating upstream");

        Ok(Self {
            name: upstream.name.clone(),
            base_url,
            scheme,
            authority,
            host_header,
            preserve_host: options.preserve_host,
            stamp: options.stamp.clone(),
            response_timeout: options.response_timeout,
            client,
        })
    }

    /// Point the request at this upstream and rewrite its headers.
    fn rewrite(&self, request: Request<Body>, origin: &Origin) -> Result<Request<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;
        parts.version = Version::HTTP_11;

        prepare_upstream_headers(&mut parts.headers, origin);

        let host = match (&origin.host, self.preserve_host) {
            (Some(inbound), true) => inbound.clone(),
            _ => self.host_header.clone(),
        };
        parts.headers.insert(header::HOST, host);

        Ok(Request::from_parts(parts, body))
    }
}

impl fmt::Debug for UpstreamConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConnector")
            .field("name", &self.name)
            .field("target", &self.base_url)
            .field("preserve_host", &self.preserve_host)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

#[async_trait]
impl Connector for UpstreamConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.base_url
    }

    async fn forward(
        &self,
        request: Request<Body>,
        origin: &Origin,
    ) -> Result<Response<Body>, ForwardError> {
        let request = self.rewrite(request, origin)?;
        tracing::debug!(upstream = %self.name, uri = %request.uri(), "Forwarding request");

        let response: Response<Incoming> =
            tokio::time::timeout(self.response_timeout, self.client.request(request))
                .await
                .map_err(|_| ForwardError::Timeout(self.response_timeout))??;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn stamp(&self, response: &mut Response<Body>) {
        self.stamp.apply(response.headers_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn upstream(host: &str, port: Option<u16>, scheme: &str) -> Upstream {
        Upstream {
            name: "u".into(),
            host: host.into(),
            port,
            scheme: scheme.into(),
        }
    }

    fn origin() -> Origin {
        Origin {
            client_addr: Some(SocketAddr::from(([10, 0, 0, 7], 51000))),
            host: Some(HeaderValue::from_static("proxy.example.net:8080")),
            proto: "http",
        }
    }

    #[tokio::test]
    async fn rewrite_targets_upstream_authority() {
        let connector = UpstreamConnector::build(
            &upstream("backend.api", Some(3000), ""),
            &ConnectorOptions::default(),
        )
        .unwrap();
        assert_eq!(connector.target(), "http://backend.api:3000");

        let request = Request::builder()
            .uri("/items?page=2")
            .header(header::HOST, "proxy.example.net:8080")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::empty())
            .unwrap();

        let out = connector.rewrite(request, &origin()).unwrap();
        assert_eq!(out.uri().to_string(), "http://backend.api:3000/items?page=2");
        assert_eq!(out.version(), Version::HTTP_11);
        assert_eq!(out.headers()[header::HOST], "backend.api:3000");
        assert_eq!(out.headers()["x-forwarded-for"], "10.0.0.7");
        assert_eq!(out.headers()["x-forwarded-host"], "proxy.example.net:8080");
        assert!(out.headers().get(header::CONNECTION).is_none());
    }

    #[tokio::test]
    async fn preserve_host_keeps_inbound_host() {
        let options = ConnectorOptions {
            preserve_host: true,
            ..ConnectorOptions::default()
        };
        let connector =
            UpstreamConnector::build(&upstream("some.host", None, "https"), &options).unwrap();
        assert_eq!(connector.target(), "https://some.host:443");

        let request = Request::builder()
            .uri("/")
            .header(header::HOST, "proxy.example.net:8080")
            .body(Body::empty())
            .unwrap();

        let out = connector.rewrite(request, &origin()).unwrap();
        assert_eq!(out.uri().scheme_str(), Some("https"));
        assert_eq!(out.headers()[header::HOST], "proxy.example.net:8080");
    }

    #[tokio::test]
    async fn bad_targets_are_rejected() {
        let options = ConnectorOptions::default();
        assert!(matches!(
            UpstreamConnector::build(&upstream("", None, ""), &options),
            Err(ConnectorError::InvalidTarget { .. })
        ));
        assert!(matches!(
            UpstreamConnector::build(&upstream("has space", None, ""), &options),
            Err(ConnectorError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connect_error() {
        // Bind then drop to get a local port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let connector = UpstreamConnector::build(
            &upstream("127.0.0.1", Some(port), "http"),
            &ConnectorOptions::default(),
        )
        .unwrap();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = connector.forward(request, &Origin::default()).await.unwrap_err();
        assert!(err.is_connect());
    }

    /// Accept TCP connections and never write a byte.
    async fn silent_backend() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        port
    }

    #[tokio::test]
    async fn stalled_tls_handshake_is_bounded_by_connect_timeout() {
        let port = silent_backend().await;
        let options = ConnectorOptions {
            connect_timeout: Duration::from_millis(200),
            response_timeout: Duration::from_secs(10),
            ..ConnectorOptions::default()
        };
        let connector =
            UpstreamConnector::build(&upstream("127.0.0.1", Some(port), "https"), &options).unwrap();

        let started = std::time::Instant::now();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = connector.forward(request, &Origin::default()).await.unwrap_err();

        assert!(err.is_connect(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn silent_backend_hits_response_timeout() {
        let port = silent_backend().await;
        let options = ConnectorOptions {
            response_timeout: Duration::from_millis(200),
            ..ConnectorOptions::default()
        };
        let connector =
            UpstreamConnector::build(&upstream("127.0.0.1", Some(port), "http"), &options).unwrap();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = connector.forward(request, &Origin::default()).await.unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {err}");
    }
}
