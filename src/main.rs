//! filewire - length-prefixed file transfer server
//!
//! Accepts TCP connections and reports every complete frame it reads.

use filewire_server::{Config, LogSink, Server};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if FILEWIRE_CONFIG is set, then env overrides)
    let config_path = std::env::var("FILEWIRE_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::from_env()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting filewire server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max frame size: {} bytes", config.limits.max_frame_size);
    match config.network.read_timeout() {
        Some(timeout) => tracing::info!("  Read timeout: {:?}", timeout),
        None => tracing::info!("  Read timeout: disabled"),
    }

    // Bind failure is fatal
    let server = match Server::bind(config.server_config(), Arc::new(LogSink)).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown or a fatal accept error)
    if let Err(e) = server.run().await {
        tracing::error!("Server stopped: {}", e);
        return Err(e.into());
    }

    tracing::info!("Server stopped");
    Ok(())
}
