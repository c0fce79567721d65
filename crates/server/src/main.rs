//! usbip-emu server
//!
//! Exports a software-defined USB device to an unmodified USB/IP client
//! (typically the Linux vhci-hcd driver) over plain TCP. The device is a
//! descriptor tree plus transfer handlers selected by profile; no
//! physical hardware is involved.

mod config;
mod dispatch;
mod registry;
mod session;

use std::net::TcpListener;

use anyhow::{Context, Result, bail};
use clap::Parser;
use device::UsbDevice;
use device::profiles::{Loopback, PortableSsd};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::ServerConfig;
use registry::DeviceRegistry;
use session::SessionEngine;

const PROFILES: &[&str] = &["storage", "loopback"];

#[derive(Parser, Debug)]
#[command(name = "usbip-emu-server")]
#[command(
    author,
    version,
    about = "USB/IP device emulator - export a software-defined USB device"
)]
#[command(long_about = "
Emulates a USB device over the USB/IP wire protocol so a remote kernel
driver can attach to it with no hardware present. Useful for firmware
prototyping, protocol research, and fuzzing.

EXAMPLES:
    # Run with default config (storage profile on port 3240)
    usbip-emu-server

    # Run with custom config
    usbip-emu-server --config /path/to/server.toml

    # Export the loopback test device with debug logging
    usbip-emu-server --profile loopback --log-level debug

    # On the importing host:
    #   modprobe vhci-hcd
    #   usbip attach -r <server-ip> -b 1-1

CONFIGURATION:
    The server looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbip-emu/server.toml
    3. /etc/usbip-emu/server.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Device profile to export (overrides config)
    #[arg(short, long, value_name = "NAME")]
    profile: Option<String>,

    /// List available device profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_profiles {
        for name in PROFILES {
            println!("{name}");
        }
        return Ok(());
    }

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = ServerConfig::default();
        let path = ServerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        ServerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        ServerConfig::load_or_default()
    };

    // CLI log level wins over the config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbip-emu server v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let profile = args
        .profile
        .as_deref()
        .unwrap_or(&config.export.profile);
    let device = build_profile(profile)?;
    info!("Exporting device profile: {}", profile);

    let mut registry = DeviceRegistry::new(config.export.clone());
    registry.register(device);

    let listener = TcpListener::bind((config.server.bind_addr.as_str(), config.server.port))
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.bind_addr, config.server.port
            )
        })?;
    info!("Listening on {}", listener.local_addr()?);

    let mut engine = SessionEngine::new(&mut registry);
    engine.run(&listener).context("Session engine failed")?;
    Ok(())
}

fn setup_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    Ok(())
}

fn build_profile(name: &str) -> Result<Box<dyn UsbDevice>> {
    match name {
        "storage" => Ok(Box::new(PortableSsd::new()?)),
        "loopback" => Ok(Box::new(Loopback::new()?)),
        other => bail!(
            "unknown device profile: {other} (available: {})",
            PROFILES.join(", ")
        ),
    }
}
