//! uboat USB/IP Server
//!
//! Emulates a USB/IP host exporting a single fake device. Every bulk or
//! control transfer is answered with an `actual_length` larger than the data
//! that follows it, to exercise how clients handle a lying server.

mod config;
mod network;

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use config::ServerConfig;
use network::UsbIpServer;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "uboat-server")]
#[command(
    author,
    version,
    about = "uboat - USB/IP server that over-reports transfer lengths"
)]
#[command(long_about = "
A USB/IP server that exports one fake device (DEAD:BEEF on busid 1-1).
After a client imports it, every CMD_SUBMIT is answered with a RET_SUBMIT
claiming 512 bytes more than were requested.

EXAMPLES:
    # Listen on the default address (127.0.0.1:3240)
    uboat-server

    # Listen on all interfaces
    uboat-server --bind 0.0.0.0:3240

    # Run with debug logging
    uboat-server --log-level debug

    # Attach from a Linux client
    usbip --tcp-port 3240 attach -r 127.0.0.1 -b 1-1

CONFIGURATION:
    The server looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/uboat/server.toml
    3. /etc/uboat/server.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Listen address, overriding the configuration file
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = ServerConfig::default();
        let path = ServerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        ServerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        ServerConfig::load_or_default()
    };

    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level;
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.server.log_level).context("Failed to setup logging")?;

    info!("uboat Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.server.log_level);

    let server = UsbIpServer::bind(&config)
        .await
        .context("Failed to start USB/IP server")?;

    info!("Press Ctrl+C to shutdown");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {:#}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }

    // Stops the accept loop and drops the listener; connection tasks end
    // with the runtime when main returns
    server_handle.abort();

    info!("Server shutdown complete");
    Ok(())
}
