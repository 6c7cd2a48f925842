//! Request handling and transformation.
//!
//! # Responsibilities
//! - Resolve the inbound path and query
//! - Re-base them onto the upstream origin, dropping the reserved routing parameter
//! - Reduce inbound headers to the upstream allow-list
//!
//! # Design Decisions
//! - The upstream origin is parsed once at startup, never per request
//! - Query pairs are re-encoded in their original order
//! - Headers are allow-listed, not deny-listed: anything unknown is dropped

use axum::extract::OriginalUri;
use axum::http::{HeaderMap, HeaderName, Request, Uri};
use once_cell::sync::Lazy;
use regex::Regex;
use url::{form_urlencoded, Url};

use crate::config::UpstreamConfig;

/// Upstream API client-identification and API-key headers.
static VENDOR_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^x-goog-api-(client|key)$").expect("VENDOR_HEADER should be a valid regex pattern")
});

/// One entry of the forwarding allow-list.
#[derive(Debug)]
pub enum HeaderRule {
    /// Header name must equal this (lowercase) name.
    Exact(&'static str),
    /// Header name must match this pattern.
    Pattern(&'static Lazy<Regex>),
}

impl HeaderRule {
    pub fn matches(&self, name: &HeaderName) -> bool {
        match self {
            HeaderRule::Exact(expected) => name.as_str() == *expected,
            HeaderRule::Pattern(pattern) => pattern.is_match(name.as_str()),
        }
    }
}

/// Headers allowed to reach the upstream.
pub static FORWARDED_HEADERS: &[HeaderRule] = &[
    HeaderRule::Exact("content-type"),
    HeaderRule::Pattern(&VENDOR_HEADER),
];

/// Immutable description of where requests are forwarded.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    origin: Url,
    reserved_query_param: String,
}

impl UpstreamTarget {
    /// Build a target from validated configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            origin: Url::parse(&config.origin)?,
            reserved_query_param: config.reserved_query_param.clone(),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn reserved_query_param(&self) -> &str {
        &self.reserved_query_param
    }

    /// Re-base `path` and `query` onto the upstream origin.
    ///
    /// Every query pair is copied in order except the reserved parameter.
    /// No `?` is emitted when nothing remains.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.origin.clone();
        url.set_path(path);

        let pairs: Vec<(String, String)> = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .filter(|(key, _)| key != self.reserved_query_param.as_str())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        url
    }
}

/// The URI the path and query are resolved from.
///
/// Prefers the pre-parsed original URI recorded by the router, which survives
/// nesting; falls back to the request's own URI.
pub fn resolve_target<B>(request: &Request<B>) -> &Uri {
    request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| request.uri())
}

/// Keep only the inbound headers on the allow-list.
pub fn filter_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut picked = HeaderMap::new();
    for (name, value) in inbound {
        if FORWARDED_HEADERS.iter().any(|rule| rule.matches(name)) {
            picked.insert(name.clone(), value.clone());
        }
    }
    picked
}
