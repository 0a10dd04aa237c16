//! Setu bridge daemon
//!
//! Startup: load config → find the device port → open the serial link →
//! serve WebSocket clients until Ctrl-C or until the serial link fails.

use setu_bridge::config::Config;
use setu_bridge::discovery::{PortDiscovery, SerialProber};
use setu_bridge::error::{Error, Result};
use setu_bridge::link::SerialLink;
use setu_bridge::registry::ConnectionRegistry;
use setu_bridge::streaming::WsServer;
use setu_bridge::transport::SerialTransport;
use setu_bridge::SerialBridge;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-bridge <path>` (positional)
/// - `setu-bridge --config <path>` (flag-based)
/// - `setu-bridge -c <path>` (short flag)
///
/// Without a path the built-in defaults are used.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

fn main() -> ExitCode {
    let config_path = parse_config_path();
    let config = match &config_path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    };

    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("Setu bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => log::info!("Using config: {}", path),
        None => log::info!("No config file given, using defaults"),
    }

    match config.and_then(run) {
        Ok(()) => {
            log::info!("Setu bridge stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let port = match &config.serial.port {
        Some(port) => {
            log::info!("Using configured port {}", port);
            port.clone()
        }
        None => {
            let prober = Arc::new(SerialProber::new(config.serial.read_timeout()));
            PortDiscovery::new(prober, &config.serial).discover_or_fail()?
        }
    };

    let transport = SerialTransport::open(&port, config.serial.baud_rate, config.serial.read_timeout())?;

    let registry = Arc::new(ConnectionRegistry::new());
    let (bridge, outbound) = SerialBridge::new(registry, &config.relay);
    let bridge = Arc::new(bridge);

    let port_name = transport.name().to_string();
    let mut link = SerialLink::start(
        &port_name,
        Box::new(transport),
        outbound,
        config.relay.repeat_delay(),
        bridge.clone(),
    )?;

    let server = WsServer::bind(&config.network.bind_address, Arc::clone(&bridge), running)?;
    log::info!("Setu bridge running on {}. Press Ctrl-C to stop.", link.port_name());
    let result = server.run();

    log::info!("Shutting down...");
    link.shutdown();
    result
}
