//! Bridge configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. a TOML file (`config/bridge.toml` unless given on the command line)
//! 3. environment variables prefixed with `SCOPE_BRIDGE_`, nested keys
//!    separated by `__`
//!
//! # Example
//! ```no_run
//! use scope_bridge::config::BridgeConfig;
//!
//! // SCOPE_BRIDGE_SERVER__SCPI_PORT=5026 overrides [server] scpi_port
//! let config = BridgeConfig::load()?;
//! config.validate().map_err(scope_bridge::error::BridgeError::Configuration)?;
//! println!("listening on port {}", config.server.scpi_port);
//! # Ok::<(), scope_bridge::error::BridgeError>(())
//! ```

use crate::error::BridgeResult;
use crate::hardware::family::{family_by_name, FAMILY_NAMES};
use crate::hardware::MAX_PODS;
use crate::logging::parse_log_level;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SCOPE_BRIDGE_";

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Control-plane listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Which instrument to drive
    #[serde(default)]
    pub instrument: InstrumentConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// SCPI listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the control socket to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Control port
    #[serde(default = "default_scpi_port")]
    pub scpi_port: u16,
    /// Capture readiness poll interval in milliseconds
    #[serde(default = "default_capture_poll_ms")]
    pub capture_poll_ms: u64,
}

/// Instrument selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Family name (2000a, 3000a, 4000a, 5000a, 6000e, 3000e)
    #[serde(default = "default_family")]
    pub family: String,
    /// Model reported by `*IDN?`; family default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Serial number reported by `*IDN?`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    /// Analog input count override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analog_channels: Option<usize>,
    /// MSO pod count override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_pods: Option<usize>,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_scpi_port() -> u16 {
    5025
}

fn default_capture_poll_ms() -> u64 {
    5
}

fn default_family() -> String {
    "6000e".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            scpi_port: default_scpi_port(),
            capture_poll_ms: default_capture_poll_ms(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            family: default_family(),
            model: None,
            serial: None,
            analog_channels: None,
            digital_pods: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment
    pub fn load() -> BridgeResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Render as TOML, in the layout [`BridgeConfig::load_from`] reads
    pub fn to_toml(&self) -> BridgeResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.trim().is_empty() {
            return Err("bind_address must not be empty".to_string());
        }
        if self.server.scpi_port == 0 {
            return Err("scpi_port must be non-zero".to_string());
        }
        if self.server.capture_poll_ms == 0 {
            return Err("capture_poll_ms must be at least 1".to_string());
        }

        parse_log_level(&self.logging.level)?;

        if family_by_name(&self.instrument.family).is_none() {
            return Err(format!(
                "Unknown instrument family '{}'. Must be one of: {}",
                self.instrument.family,
                FAMILY_NAMES.join(", ")
            ));
        }
        if let Some(channels) = self.instrument.analog_channels {
            if !(1..=8).contains(&channels) {
                return Err(format!("analog_channels {channels} out of range 1-8"));
            }
        }
        if let Some(pods) = self.instrument.digital_pods {
            if pods > MAX_PODS {
                return Err(format!("digital_pods {pods} exceeds {MAX_PODS}"));
            }
        }

        Ok(())
    }
}
