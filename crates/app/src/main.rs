//! Codebreak - two-player code-breaking lobby server
//!
//! # Usage
//!
//! ```bash
//! # Defaults, or codebreak.toml from the platform config directory
//! codebreak
//!
//! # Explicit config file, port taken from the environment
//! PORT=9000 codebreak --config ./codebreak.toml
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use codebreak_net::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::ServerConfig;

/// Upper bound on waiting for clients to receive the shutdown notice
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Codebreak lobby server
#[derive(Parser, Debug)]
#[command(name = "codebreak")]
#[command(about = "Two-player code-breaking lobby server")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => config.with_port_override(args.port),
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    tracing::info!("Starting Codebreak");

    let server_config = match config.to_server_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::start(server_config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %server.addr(), "Listening for players");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, server.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Clients did not drain in time, exiting anyway");
    }
    tracing::info!("Stopped");
}
