//! Setu console - drive the kit from a terminal
//!
//! Connects to the bridge, reads one command per line from stdin and keeps
//! the device state fresh between commands. Type `help` for the command list.

use setu_blocks::console::{self, ConsoleCommand};
use setu_blocks::{BlockSession, BlocksConfig, Result, WsLink};
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long to wait for input before refreshing state again
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("setu_blocks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')));

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            BlocksConfig::load(Path::new(path))?
        }
        None => {
            info!("Using default configuration");
            BlocksConfig::default()
        }
    };

    info!("Setu console v{}", env!("CARGO_PKG_VERSION"));
    let link = WsLink::new(&config.connection)?;
    let mut session = BlockSession::new(link, config.session.min_send_interval());

    // Stdin blocks, so lines arrive through a channel while the main loop
    // keeps pumping telemetry
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    println!("Connecting to {} - type `help` for commands", session.link().url());

    loop {
        if let Err(e) = session.pump() {
            warn!("Telemetry error: {}", e);
        }

        let line = match rx.recv_timeout(INPUT_POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let command = match console::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }

        match console::execute(&mut session, &command) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("{}", e),
        }
    }

    info!("Setu console finished");
    Ok(())
}
