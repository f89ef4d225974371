//! quick-usb host
//!
//! Exposes one external accessory at a time to remote callers: device
//! enumeration, a single session, and bulk transfers over its streams.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{AccessoryBridge, create_accessory_bridge, setup_logging};
use host::Dispatcher;
use host::config::{HostConfig, validate_log_level};
use host::network::CommandServer;
use host::platform::UsbPlatform;
use host::worker::spawn_accessory_worker;
use protocol::{MethodCall, MethodResponse, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "quick-usb-host")]
#[command(author, version, about = "Accessory host - bulk transfers over a command socket")]
#[command(long_about = "
Serves a small command surface (device list, open/close, configuration,
bulk transfers) for USB accessories over a local TCP socket.

EXAMPLES:
    # Run with default config
    quick-usb-host

    # Run with custom config
    quick-usb-host --config ~/quick-usb.toml

    # List accessories without starting the server
    quick-usb-host --list-devices

    # Run with debug logging
    quick-usb-host --log-level debug

CONFIGURATION:
    The host looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/quick-usb/host.toml
    3. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List accessories and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the command server address
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = HostConfig::default();
        let path = HostConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = match args.config {
        Some(ref path) => {
            HostConfig::load(Some(path.clone())).context("Failed to load configuration")?
        }
        None => HostConfig::load_or_default(),
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.host.log_level);
    validate_log_level(log_level).context("Invalid --log-level")?;
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("quick-usb host v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let platform =
        UsbPlatform::new(config.usb.filters.clone()).context("Failed to initialize libusb")?;
    let dispatcher = Dispatcher::new(Arc::new(platform), config.transfer.max_transfer_length);

    let (bridge, worker) = create_accessory_bridge();
    let worker_handle =
        spawn_accessory_worker(worker, dispatcher).context("Failed to spawn accessory worker")?;

    let result = if args.list_devices {
        list_devices_mode(&bridge).await
    } else {
        let addr = match args.bind {
            Some(addr) => addr,
            None => config.bind_addr()?,
        };
        run_server(addr, bridge.clone()).await
    };

    info!("Shutting down accessory worker...");
    if let Err(e) = bridge.shutdown().await {
        error!("Error shutting down accessory worker: {:#}", e);
    }
    if let Err(e) = worker_handle.join() {
        error!("Accessory worker thread panicked: {:?}", e);
    }

    result
}

/// Print the registry snapshot and exit
async fn list_devices_mode(bridge: &AccessoryBridge) -> Result<()> {
    let response = bridge
        .call(MethodCall::new("getDeviceList"))
        .await
        .context("Failed to query device list")?;

    let records = match response {
        MethodResponse::Success(Value::List(records)) => records,
        other => return Err(anyhow!("Unexpected device list response: {:?}", other)),
    };

    if records.is_empty() {
        println!("No accessories found.");
        return Ok(());
    }

    println!("Found {} accessory(ies):\n", records.len());
    for record in &records {
        let text = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or("");
        let id = record.get("identifier").and_then(Value::as_int).unwrap_or_default();
        println!("  [{}] {} {}", id, text("manufacturer"), text("product"));
        println!("      Serial: {}", text("serialNumber"));
        let protocols: Vec<&str> = record
            .get("protocols")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        println!("      Protocols: {}", protocols.join(", "));
        println!();
    }

    Ok(())
}

/// Serve commands until Ctrl+C
async fn run_server(addr: SocketAddr, bridge: AccessoryBridge) -> Result<()> {
    let server = CommandServer::bind(addr, bridge)
        .await
        .context("Failed to start command server")?;
    info!("Listening on: {}", server.local_addr()?);
    info!("Press Ctrl+C to shutdown");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {:#}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }

    server_handle.abort();
    info!("Server shutdown complete");
    Ok(())
}
