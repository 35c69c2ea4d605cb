//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: health, debug dump, everything else proxied
//! - Wire up middleware (request ID, tracing, read/write timeouts)
//! - Serve plaintext or TLS on a bound listener until shutdown

use std::net::{SocketAddr, TcpListener};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::schema::ServerSettings;
use crate::http::proxy::{proxy_handler, AppState};
use crate::net::ConnectionTimeouts;
use crate::runtime::ProxyContext;

pub const HEALTH_PATH: &str = "/.relay-proxy/health";
pub const CONFIG_PATH: &str = "/.relay-proxy/config";

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    timeouts: ConnectionTimeouts,
    tls: Option<RustlsConfig>,
}

impl HttpServer {
    /// Create a server answering from `context`. TLS is used when `tls` is set.
    pub fn new(context: ProxyContext, settings: &ServerSettings, tls: Option<RustlsConfig>) -> Self {
        let timeouts = ConnectionTimeouts::uniform(settings.timeout);
        let state = AppState {
            context,
            proto: if tls.is_some() { "https" } else { "http" },
        };
        let router = Self::build_router(state, settings.debug, timeouts);

        Self {
            router,
            timeouts,
            tls,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The write timeout only wraps the local routes. Proxied requests are
    /// bounded by the upstream connector, which answers 502 on expiry.
    fn build_router(state: AppState, debug: bool, timeouts: ConnectionTimeouts) -> Router {
        let mut router = Router::new().route(HEALTH_PATH, any(health_handler));
        if debug {
            router = router.route(CONFIG_PATH, get(config_handler));
        }

        router
            .route_layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeouts.write,
            ))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyTimeoutLayer::new(timeouts.read)),
            )
    }

    /// Router with all routes and layers, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires. In-flight requests are not drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            tls = self.tls.is_some(),
            "HTTP server starting"
        );

        let handle = Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.shutdown();
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            Some(tls) => {
                let mut server = axum_server::from_tcp_rustls(listener, tls).handle(handle);
                self.timeouts.apply(server.http_builder());
                server.serve(app).await?;
            }
            None => {
                let mut server = axum_server::from_tcp(listener).handle(handle);
                self.timeouts.apply(server.http_builder());
                server.serve(app).await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Current configuration as YAML, skipped rules included.
async fn config_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.context.current();
    match snapshot.config().dump() {
        Ok(yaml) => ([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render configuration");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
