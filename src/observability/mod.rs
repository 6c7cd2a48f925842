//! Observability subsystem.
//!
//! All subsystems emit `tracing` events; `logging.rs` installs the subscriber
//! that formats them. Request/response spans come from `tower_http`'s
//! `TraceLayer` in the HTTP server.

pub mod logging;

pub use logging::init_logging;
