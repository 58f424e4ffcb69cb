//! Relay proxy
//!
//! Forwards HTTP requests, streams downloads and relays WebSocket traffic to
//! targets named by the caller.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 RELAY PROXY                   │
//!   /proxy?url=…          │  ┌────────┐   ┌───────────┐   ┌───────────┐  │
//!   ──────────────────────┼─▶│  http  │──▶│ forwarder │──▶│ upstream  │──┼──▶ Target
//!   /download?url=…       │  │ server │──▶│ downloader│──▶│  client   │  │
//!   ──────────────────────┼─▶│        │   └───────────┘   └───────────┘  │
//!   /ws (x-target-url)    │  │        │   ┌───────────┐   ┌───────────┐  │
//!   ◀═════════════════════┼═▶│        │══▶│   relay   │══▶│  connect  │══┼══▶ Target socket
//!                         │  └────────┘   │  bridge   │   └───────────┘  │
//!                         │               └───────────┘                  │
//!                         │  config · observability · lifecycle          │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::lifecycle::signals::spawn_signal_handler;
use relay_proxy::lifecycle::startup::{resolve_config, Overrides};
use relay_proxy::observability::{logging, metrics};
use relay_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Forwarding, download and WebSocket relay proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overrides observability.log_level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = Overrides {
        bind_address: cli.bind,
        log_level: cli.log_level,
    };
    let config = resolve_config(cli.config.as_deref(), &overrides)?;

    logging::init_logging(&config.observability.log_level, config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        forward_timeout_secs = config.timeouts.forward_secs,
        download_timeout_secs = config.timeouts.download_secs,
        verify_tls = config.outbound.verify_tls,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
