//! Command execution.

use crate::Commands;
use colored::Colorize;
use filewire_client::payload::{random_payload, read_file};
use filewire_client::{Client, ConnectionConfig};
use filewire_server::Config;
use std::time::{Duration, Instant};

/// Executes a command and returns the formatted output.
pub async fn execute(
    cmd: Commands,
    config: ConnectionConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Send {
            size,
            file,
            count,
            delay_ms,
        } => {
            let payload = match file {
                Some(path) => read_file(&path).await?,
                None => random_payload(size)?,
            };

            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let addr = config.addr;
            let client = Client::new(config);
            let frames = vec![payload; count];

            let started = Instant::now();
            let total = client.send_all(&frames).await?;
            let elapsed = started.elapsed();

            Ok(format!(
                "{} {} in {} frame(s) to {} ({:.1?})",
                "Sent".green(),
                format_bytes(total).cyan(),
                count,
                addr,
                elapsed
            ))
        }

        Commands::GenConfig => Ok(Config::default().to_yaml()?),
    }
}

/// Formats a byte count with a binary unit suffix.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {} ({} bytes)", value, UNITS[unit], bytes)
}
