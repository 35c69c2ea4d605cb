//! Proxy request handler.
//!
//! Every request that is not a front-door route lands here. The handler loads
//! the serving snapshot once and uses only that snapshot until it responds.

use std::str::FromStr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use axum::response::{IntoResponse, Response};

use crate::http::request::Origin;
use crate::http::response::ProxyError;
use crate::observability::metrics;
use crate::runtime::ProxyContext;
use crate::upstream::ForwardError;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub context: ProxyContext,

    /// `http` or `https`, for `X-Forwarded-Proto`.
    pub proto: &'static str,
}

/// Match the request against the rules and forward it to the chosen upstream.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let snapshot = state.context.current();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let origin = Origin::of(&request, state.proto);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        host = %origin.host_str(),
        path = %path,
        "Proxying request"
    );

    // 1. Match rule
    let Some(route) = snapshot.match_request(origin.host_str(), &path) else {
        tracing::debug!(request_id = %request_id, host = %origin.host_str(), path = %path, "No rule matched");
        metrics::record_request(&method, 404, "none", start_time);
        return ProxyError::NoRuleMatched.into_response();
    };

    // 2. Select connector
    let Some(connector) = snapshot.connector(&route.upstream) else {
        tracing::error!(
            request_id = %request_id,
            rule = route.index,
            upstream = %route.upstream,
            "Rule references an upstream that is not configured"
        );
        metrics::record_request(&method, 502, &route.upstream, start_time);
        return ProxyError::UpstreamNotFound(route.upstream.clone()).into_response();
    };

    // 3. Path rewrite
    let request = if route.strip_path {
        match with_path(request, &route.rewrite_path(&path)) {
            Ok(request) => request,
            Err(e) => {
                metrics::record_request(&method, 502, &route.upstream, start_time);
                return ProxyError::Forward(e).into_response();
            }
        }
    } else {
        request
    };

    // 4. Forward
    match connector.forward(request, &origin).await {
        Ok(mut response) => {
            connector.stamp(&mut response);
            metrics::record_request(
                &method,
                response.status().as_u16(),
                &route.upstream,
                start_time,
            );
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                upstream = %route.upstream,
                target = %connector.target(),
                connect = e.is_connect(),
                timeout = e.is_timeout(),
                error = %e,
                "Upstream error"
            );
            metrics::record_request(&method, 502, &route.upstream, start_time);
            ProxyError::Forward(e).into_response()
        }
    }
}

/// Replace the request path, keeping the query.
fn with_path(request: Request<Body>, path: &str) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut uri_parts = parts.uri.into_parts();
    uri_parts.path_and_query =
        Some(PathAndQuery::from_str(&path_and_query).map_err(axum::http::Error::from)?);
    parts.uri = Uri::from_parts(uri_parts).map_err(axum::http::Error::from)?;

    Ok(Request::from_parts(parts, body))
}
