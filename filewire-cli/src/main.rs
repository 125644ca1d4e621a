//! filewire-cli - Command-line client for filewire
//!
//! Sends length-prefixed frames to a filewire server.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use filewire_client::ConnectionConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filewire-cli")]
#[command(about = "Command-line client for the filewire transfer server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3000", env = "FILEWIRE_SERVER")]
    server: SocketAddr,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Per-frame write timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0")]
    write_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send frames to the server
    Send {
        /// Size in bytes of the random payload
        #[arg(short = 'n', long, default_value = "4000", conflicts_with = "file")]
        size: usize,

        /// Send the contents of a file instead of random bytes
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of frames to send over the connection
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Wait this many milliseconds before connecting
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Print a default server configuration as YAML
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ConnectionConfig::new(cli.server)
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));
    if cli.write_timeout > 0 {
        config = config.with_write_timeout(Duration::from_secs(cli.write_timeout));
    }

    match commands::execute(cli.command, config).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
