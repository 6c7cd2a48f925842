//! The forwarding handler.
//!
//! ```text
//! inbound request
//!     → OPTIONS? answer locally with CORS headers
//!     → request.rs (upstream URL, header allow-list)
//!     → relay.rs (inbound body, chunk by chunk)
//!     → upstream client
//!     → response.rs (status, merged headers, relayed body)
//! ```

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::http::{Method, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::http::relay::{Direction, RelayBody};
use crate::http::request::{filter_headers, resolve_target, UpstreamTarget};
use crate::http::response::{preflight, relay_response};

/// HTTP client used to reach the upstream.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Failures the handler does not recover from.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The inbound target could not be turned into an upstream URI.
    #[error("invalid upstream target `{url}`: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    /// The upstream could not be reached or failed before sending a response head.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ForwardError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::error!(error = %self, status = %status, "Forwarding failed");
        (status, status.canonical_reason().unwrap_or("Error")).into_response()
    }
}

/// Build the upstream client: HTTPS with webpki roots, plain HTTP allowed.
pub fn build_client() -> UpstreamClient {
    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Forwards requests to a single upstream target.
#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    target: Arc<UpstreamTarget>,
}

impl Forwarder {
    pub fn new(client: UpstreamClient, target: UpstreamTarget) -> Self {
        Self {
            client,
            target: Arc::new(target),
        }
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Forward one inbound request and relay the upstream's answer.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        if request.method() == Method::OPTIONS {
            return Ok(preflight());
        }

        let inbound = resolve_target(&request);
        let url = self.target.upstream_url(inbound.path(), inbound.query());
        let uri: Uri = url.as_str().parse().map_err(|source| ForwardError::InvalidTarget {
            url: url.to_string(),
            source,
        })?;

        let (parts, body) = request.into_parts();
        let headers = filter_headers(&parts.headers);

        tracing::debug!(
            method = %parts.method,
            upstream = %url,
            forwarded_headers = headers.len(),
            "Forwarding request"
        );

        let body = if body.is_end_stream() {
            Body::empty()
        } else {
            Body::new(RelayBody::new(body, Direction::Request))
        };

        let mut upstream_request = Request::new(body);
        *upstream_request.method_mut() = parts.method;
        *upstream_request.uri_mut() = uri;
        *upstream_request.headers_mut() = headers;

        let upstream_response = self.client.request(upstream_request).await?;

        tracing::debug!(
            status = %upstream_response.status(),
            upstream = %url,
            "Upstream responded"
        );

        Ok(relay_response(upstream_response))
    }
}
