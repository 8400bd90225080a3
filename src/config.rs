//! Driver configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `OXXIUS_`, nested keys separated by
//!    `__` (e.g. `OXXIUS_SERIAL__PORT=/dev/ttyUSB0`)
//!
//! # Example
//! ```toml
//! log_level = "debug"
//! profile = "current"
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//!
//! [device]
//! kind = "combiner"
//! channels = [
//!     { prefix = "L1", kind = "lbx" },
//!     { prefix = "L3", kind = "lcx" },
//! ]
//! ```

use crate::error::{LaserError, LaserResult};
use crate::protocol::Profile;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serial line settings
    pub serial: SerialSettings,
    /// Protocol dictionary generation
    #[serde(default)]
    pub profile: Profile,
    /// What sits at the other end of the port
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Serial line settings.
///
/// Data bits, parity, stop bits and flow control are fixed at 8N1 with no
/// flow control and are not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SerialSettings {
    /// Settings for `port` with the factory defaults (9600 baud, 1 s timeout).
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Read timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, coloured output
    #[default]
    Pretty,
    /// Single-line output without colours
    Compact,
    /// JSON lines
    Json,
}

/// Device family at the end of the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Stand-alone LBX laser (constant-current capable)
    #[default]
    Lbx,
    /// Stand-alone LCX laser
    Lcx,
    /// L6CC combiner with channel-addressed lasers
    Combiner,
}

/// Laser family of a combiner channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaserKind {
    /// LBX diode laser
    Lbx,
    /// LCX DPSS laser
    Lcx,
}

/// Device description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device family
    #[serde(default)]
    pub kind: DeviceKind,
    /// Lasers behind a combiner
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// One laser behind a combiner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel token, e.g. "L1"
    pub prefix: String,
    /// Laser family
    pub kind: LaserKind,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    1000
}

impl DriverConfig {
    /// Minimal configuration for `port`.
    pub fn for_port(port: &str) -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            serial: SerialSettings::new(port),
            profile: Profile::default(),
            device: DeviceConfig::default(),
        }
    }

    /// Load configuration from a TOML file and `OXXIUS_` environment variables
    pub fn load_from<P: AsRef<Path>>(path: P) -> LaserResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OXXIUS_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from a port with environment overrides only.
    pub fn from_env(port: &str) -> LaserResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::for_port(port)))
            .merge(Env::prefixed("OXXIUS_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> LaserResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(LaserError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.port.trim().is_empty() {
            return Err(LaserError::Configuration(
                "serial.port must not be empty".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(LaserError::Configuration(
                "serial.baud_rate must be positive".to_string(),
            ));
        }
        if self.serial.timeout_ms == 0 {
            return Err(LaserError::Configuration(
                "serial.timeout_ms must be positive".to_string(),
            ));
        }

        if self.device.kind != DeviceKind::Combiner && !self.device.channels.is_empty() {
            return Err(LaserError::Configuration(
                "channels are only valid for a combiner device".to_string(),
            ));
        }

        let mut prefixes = HashSet::new();
        for channel in &self.device.channels {
            if channel.prefix.trim().is_empty() {
                return Err(LaserError::Configuration(
                    "channel prefix must not be empty".to_string(),
                ));
            }
            if !prefixes.insert(channel.prefix.trim()) {
                return Err(LaserError::Configuration(format!(
                    "Duplicate channel prefix: {}",
                    channel.prefix
                )));
            }
        }

        Ok(())
    }

    /// Look up a combiner channel by prefix.
    pub fn channel(&self, prefix: &str) -> Option<&ChannelConfig> {
        self.device.channels.iter().find(|c| c.prefix == prefix)
    }
}
