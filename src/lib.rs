//! Gemini API relay.
//!
//! Forwards every inbound request to a single upstream API origin, keeping
//! only the allow-listed headers, streaming both bodies chunk by chunk, and
//! answering with permissive cross-origin headers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
