//! CLI entry point for scope-bridge
//!
//! Loads the layered configuration, installs logging, builds the instrument
//! for the configured family and serves SCPI control sessions until killed.
//!
//! # Usage
//!
//! ```bash
//! scope-bridge --config config/bridge.toml
//! scope-bridge --family 2000a --port 5026 --log-level debug
//! SCOPE_BRIDGE_SERVER__SCPI_PORT=5030 scope-bridge --json-logs
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use scope_bridge::config::{BridgeConfig, LogFormat, DEFAULT_CONFIG_PATH};
use scope_bridge::dispatch::Dispatcher;
use scope_bridge::error::BridgeError;
use scope_bridge::hardware::family::family_for_model;
use scope_bridge::hardware::sim::SimulatedScope;
use scope_bridge::instrument::Instrument;
use scope_bridge::logging;
use scope_bridge::server::BridgeServer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "scope-bridge")]
#[command(about = "SCPI control bridge for bench oscilloscopes", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SCPI control port, overrides [server] scpi_port
    #[arg(long)]
    port: Option<u16>,

    /// Instrument family (2000a, 3000a, 4000a, 5000a, 6000e, 3000e)
    #[arg(long)]
    family: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BridgeConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.server.scpi_port = port;
    }
    if let Some(family) = cli.family {
        config.instrument.family = family;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    config
        .validate()
        .map_err(BridgeError::Configuration)
        .context("invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let family = family_for_model(&config.instrument.family, config.instrument.model.as_deref())
        .ok_or_else(|| BridgeError::UnknownFamily(config.instrument.family.clone()))?;
    let mut builder = SimulatedScope::builder(family)
        .auto_complete(true)
        .call_log_capacity(0);
    if let Some(serial) = &config.instrument.serial {
        builder = builder.serial(serial.clone());
    }
    if let Some(model) = &config.instrument.model {
        builder = builder.model(model.clone());
    }
    if let Some(channels) = config.instrument.analog_channels {
        builder = builder.analog_channels(channels);
    }
    if let Some(pods) = config.instrument.digital_pods {
        builder = builder.digital_pods(pods);
    }

    info!(
        family = %config.instrument.family,
        port = config.server.scpi_port,
        "scope-bridge starting"
    );
    let instrument = Instrument::new(Box::new(builder.build()));

    let dispatcher = Dispatcher::new(instrument.into_shared());
    let server = BridgeServer::bind(&config.server, dispatcher).context("binding SCPI port")?;
    server.serve().context("serving control sessions")?;
    Ok(())
}
