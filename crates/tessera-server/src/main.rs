//! Tessera - interactive grid server
//!
//! Reads console commands from stdin and applies them to a single map.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;
use tessera_common::SessionId;
use tessera_server::{Server, ServerConfig, CONFIG_FILE};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tessera=info".parse()?))
        .init();

    info!("Tessera starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = ServerConfig::load_from(&config_path);
    if !Path::new(&config_path).exists() {
        config.save_to(&config_path)?;
    }
    let mut server = Server::new(config);
    let starter = server.spawn_block_grid(8, 3, 1)?;
    info!("Starter grid {starter} ready, type 'help' for commands");

    let session = SessionId::SERVER;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if matches!(trimmed, "quit" | "exit") {
            break;
        }
        if !trimmed.is_empty() {
            match server.execute(session, trimmed) {
                Ok(output) => {
                    for text in output {
                        writeln!(stdout, "{text}")?;
                    }
                },
                Err(e) => writeln!(stdout, "error: {e}")?,
            }
            for event in server.drain_events() {
                writeln!(stdout, "event: {event:?}")?;
            }
            for message in server.drain_debug(session) {
                writeln!(stdout, "nodes: {}", serde_json::to_string(&message)?)?;
            }
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
    }

    server.disconnect(session);
    info!("Tessera shutdown complete");
    Ok(())
}
