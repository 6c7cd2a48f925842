//! Gemini API relay.
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────┐
//!     ──────────────────────┼─▶ OPTIONS? ──▶ 204 + CORS                │
//!                           │      │                                   │
//!                           │      ▼                                   │
//!                           │  path/query re-based, `_path` dropped    │
//!                           │  headers allow-listed                    │  upstream
//!                           │  request body relayed ──────────────────▶┼──────────▶
//!                           │                                          │
//!     Client Response       │  status + CORS ⊕ upstream headers        │
//!     ◀─────────────────────┼── response body relayed ◀────────────────┼──────────
//!                           └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gemini_relay::config::{load_config, validate_config, ConfigError, RelayConfig};
use gemini_relay::lifecycle::{signals, Shutdown};
use gemini_relay::observability::init_logging;
use gemini_relay::HttpServer;

#[derive(Parser)]
#[command(name = "gemini-relay")]
#[command(about = "Streaming relay for the Gemini API", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `upstream.origin`.
    #[arg(short, long)]
    upstream: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn into_config(self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(upstream) = self.upstream {
            config.upstream.origin = upstream;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let print_config = cli.print_config;
    let config = cli.into_config()?;

    if print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config.observability);

    tracing::info!("gemini-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.origin,
        "Configuration loaded"
    );
    tracing::debug!(config = %config.to_toml()?, "Effective configuration");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
