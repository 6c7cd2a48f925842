//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router and dispatch every path and method to the forwarder
//! - Wire up request tracing
//! - Bind server to listener and stop on the shutdown signal

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::http::forward::{build_client, Forwarder};
use crate::http::request::UpstreamTarget;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration must already be validated.
    pub fn new(config: RelayConfig) -> Result<Self, url::ParseError> {
        let target = UpstreamTarget::from_config(&config.upstream)?;
        let forwarder = Forwarder::new(build_client(), target);

        tracing::info!(
            upstream = %forwarder.target().origin(),
            reserved_query_param = forwarder.target().reserved_query_param(),
            "Forwarder ready"
        );

        let router = Self::build_router(AppState { forwarder });
        Ok(Self { router })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.forwarder.handle(request).await.into_response()
}
