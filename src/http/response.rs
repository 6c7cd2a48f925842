//! Response handling and transformation.
//!
//! # Responsibilities
//! - Answer CORS pre-flight requests locally
//! - Merge upstream headers over the permissive cross-origin set
//! - Relay the upstream body back without buffering it
//!
//! # Design Decisions
//! - Upstream headers win any collision; all their values are kept
//! - An upstream body that is already complete is not wrapped in a relay

use axum::body::{Body, HttpBody};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode};
use hyper::body::Incoming;

use crate::http::relay::{Direction, RelayBody};

/// The fixed cross-origin header set.
pub fn cors_headers() -> HeaderMap {
    let any = HeaderValue::from_static("*");
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, any.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, any.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, any);
    headers
}

/// Response to an `OPTIONS` request: no body, cross-origin headers only.
pub fn preflight() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = cors_headers();
    response
}

/// Overlay every upstream header onto the cross-origin base.
pub fn merge_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut merged = cors_headers();
    for name in upstream.keys() {
        merged.remove(name);
        for value in upstream.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

/// Build the outbound response from an upstream response.
pub fn relay_response(upstream: Response<Incoming>) -> Response<Body> {
    let (parts, incoming) = upstream.into_parts();

    let body = if incoming.is_end_stream() {
        Body::empty()
    } else {
        Body::new(RelayBody::new(Body::new(incoming), Direction::Response))
    };

    let mut response = Response::new(body);
    *response.status_mut() = parts.status;
    *response.headers_mut() = merge_headers(&parts.headers);
    response
}
