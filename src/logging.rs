//! Tracing subscriber setup for binaries.
//!
//! The library itself only emits `tracing` events inside per-device spans; a
//! binary decides where they go by calling [`init`] once at startup.
//!
//! # Example
//! ```no_run
//! use oxxius_laser::config::LogFormat;
//! use oxxius_laser::logging::{self, LoggingConfig};
//! use tracing::Level;
//!
//! logging::init(LoggingConfig::new(Level::DEBUG).with_format(LogFormat::Compact)).unwrap();
//! tracing::info!("driver started");
//! ```

use crate::config::{DriverConfig, LogFormat};
use crate::error::{LaserError, LaserResult};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Subscriber options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to enable ANSI colors (Pretty only)
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Options with the given default level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Options taken from a driver configuration
    pub fn from_driver_config(config: &DriverConfig) -> LaserResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.log_level)?,
            format: config.log_format,
            ..Default::default()
        })
    }

    /// Set output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global subscriber.
///
/// Idempotent: if a subscriber is already installed this returns `Ok(())`.
pub fn init(config: LoggingConfig) -> LaserResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(config.with_ansi)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_filter(env_filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => Ok(()),
        // Already initialised elsewhere (tests, embedding applications)
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(LaserError::Configuration(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Parse a log level name
pub fn parse_log_level(level: &str) -> LaserResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LaserError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_from_driver_config() {
        let mut config = DriverConfig::for_port("COM1");
        config.log_level = "error".to_string();
        config.log_format = LogFormat::Json;

        let logging = LoggingConfig::from_driver_config(&config).unwrap();
        assert_eq!(logging.level, Level::ERROR);
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new(Level::WARN)
            .with_format(LogFormat::Compact)
            .with_ansi(false);
        assert_eq!(config.level, Level::WARN);
        assert!(!config.with_ansi);
    }
}
