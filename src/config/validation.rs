//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every failure is
//! collected so a bad file reports all of its problems at once.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("upstream.origin `{0}` is not a valid URL")]
    InvalidOrigin(String),

    #[error("upstream.origin `{0}` must use http or https")]
    UnsupportedScheme(String),

    #[error("upstream.origin `{0}` must not carry a path, query or fragment")]
    OriginNotBare(String),

    #[error("upstream.reserved_query_param must not be empty")]
    EmptyReservedParam,

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Validate a configuration, returning every failed check.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Err(e) = validate_origin(&config.upstream.origin) {
        errors.push(e);
    }

    if config.upstream.reserved_query_param.is_empty() {
        errors.push(ValidationError::EmptyReservedParam);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_origin(origin: &str) -> Result<(), ValidationError> {
    let url = Url::parse(origin).map_err(|_| ValidationError::InvalidOrigin(origin.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme(origin.to_string()));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidOrigin(origin.to_string()));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::OriginNotBare(origin.to_string()));
    }

    Ok(())
}
