//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, shutdown)
//!     → forward.rs (one forwarder, every path and method)
//!     → request.rs (upstream URL, header allow-list)
//!     → relay.rs (request and response bodies, chunk by chunk)
//!     → response.rs (status, merged headers)
//!     → Send to client
//! ```

pub mod forward;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use relay::{Direction, RelayBody, RelayState};
pub use request::UpstreamTarget;
pub use server::HttpServer;
