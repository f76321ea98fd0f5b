//! Daemon configuration loaded from a TOML file.
//!
//! The file mirrors the sections an operator edits on the Pi:
//!
//! ```toml
//! [sensor]
//! location = "greenhouse"
//! pin = "D4"
//! model = "DHT22"
//!
//! [monitor]
//! read_interval_seconds = 30
//! retry_backoff_seconds = 2.0
//!
//! [metrics]
//! host = "0.0.0.0"
//! port = 9100
//!
//! [logging]
//! log_file = "/var/log/dht_exporter/sensor.log"
//! log_level = "INFO"
//! ```
//!
//! Pin and log level names are resolved through explicit tables and rejected
//! at load time if unknown.

use crate::error::{MonitorError, Result};
use crate::sensor::SensorModel;
use crate::web::WebConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Complete daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Sensor wiring and identity
    pub sensor: SensorSettings,
    /// Loop cadence
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Metrics HTTP listener
    #[serde(default)]
    pub metrics: WebConfig,
    /// Log sink
    pub logging: LoggingSettings,
}

/// `[sensor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorSettings {
    /// Free-form location label attached to every metric
    pub location: String,
    /// Data pin name, e.g. `D4` or `GPIO4`
    pub pin: String,
    /// Sensor model
    #[serde(default)]
    pub model: SensorModel,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSettings {
    /// Seconds slept after each completed tick
    #[serde(default = "default_read_interval")]
    pub read_interval_seconds: u64,
    /// Seconds slept after a transient sensor fault instead of the interval
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: f64,
}

fn default_read_interval() -> u64 {
    crate::DEFAULT_READ_INTERVAL_SECS
}

fn default_retry_backoff() -> f64 {
    crate::DEFAULT_RETRY_BACKOFF_SECS
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            read_interval_seconds: default_read_interval(),
            retry_backoff_seconds: default_retry_backoff(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// File that receives a copy of every log line
    pub log_file: PathBuf,
    /// Minimum level written
    #[serde(default)]
    pub log_level: LogLevel,
}

impl MonitorConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MonitorError::config_error(format!(
                "config file not found at {}; copy config.example.toml to {} and update it",
                path.display(),
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| MonitorError::config_error(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| MonitorError::config_error(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.sensor.location.trim().is_empty() {
            return Err(MonitorError::config_error("sensor.location must not be empty"));
        }

        self.sensor.gpio_pin()?;

        if self.monitor.read_interval_seconds == 0 {
            return Err(MonitorError::config_error(
                "monitor.read_interval_seconds must be a positive integer",
            ));
        }

        let backoff = self.monitor.retry_backoff_seconds;
        if !backoff.is_finite() || backoff <= 0.0 {
            return Err(MonitorError::config_error(
                "monitor.retry_backoff_seconds must be a positive number",
            ));
        }
        if backoff >= self.monitor.read_interval_seconds as f64 {
            return Err(MonitorError::config_error(format!(
                "monitor.retry_backoff_seconds ({}) must be below read_interval_seconds ({})",
                backoff, self.monitor.read_interval_seconds
            )));
        }

        if self.logging.log_file.as_os_str().is_empty() {
            return Err(MonitorError::config_error("logging.log_file must not be empty"));
        }

        Ok(())
    }

    /// Normal delay between ticks.
    pub fn read_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.read_interval_seconds)
    }

    /// Delay after a transient sensor fault.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.monitor.retry_backoff_seconds)
    }
}

impl SensorSettings {
    /// Resolve the configured pin name.
    pub fn gpio_pin(&self) -> Result<GpioPin> {
        self.pin.parse()
    }
}

/// A BCM GPIO line number resolved from a board pin name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpioPin(u8);

impl GpioPin {
    /// BCM line number.
    pub fn bcm(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// Board pin names accepted in `sensor.pin`, mapped to BCM line numbers.
pub const PIN_TABLE: &[(&str, u8)] = &[
    ("D0", 0),
    ("D1", 1),
    ("D2", 2),
    ("D3", 3),
    ("D4", 4),
    ("D5", 5),
    ("D6", 6),
    ("D7", 7),
    ("D8", 8),
    ("D9", 9),
    ("D10", 10),
    ("D11", 11),
    ("D12", 12),
    ("D13", 13),
    ("D14", 14),
    ("D15", 15),
    ("D16", 16),
    ("D17", 17),
    ("D18", 18),
    ("D19", 19),
    ("D20", 20),
    ("D21", 21),
    ("D22", 22),
    ("D23", 23),
    ("D24", 24),
    ("D25", 25),
    ("D26", 26),
    ("D27", 27),
    // Aliases used by the kernel's naming
    ("SDA", 2),
    ("SCL", 3),
    ("CE1", 7),
    ("CE0", 8),
    ("MISO", 9),
    ("MOSI", 10),
    ("SCLK", 11),
    ("TXD", 14),
    ("RXD", 15),
];

impl FromStr for GpioPin {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_uppercase();
        // "GPIO17" and "BCM17" are spelled "D17" in the table.
        let name = match name
            .strip_prefix("GPIO")
            .or_else(|| name.strip_prefix("BCM"))
        {
            Some(num) => format!("D{}", num),
            None => name,
        };

        PIN_TABLE
            .iter()
            .find(|(pin_name, _)| *pin_name == name)
            .map(|&(_, bcm)| GpioPin(bcm))
            .ok_or_else(|| {
                MonitorError::config_error(format!(
                    "unknown sensor pin '{}'; expected a board name such as D4 or GPIO17",
                    s
                ))
            })
    }
}

/// Log levels accepted in `logging.log_level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

const LOG_LEVEL_TABLE: &[(&str, LogLevel)] = &[
    ("DEBUG", LogLevel::Debug),
    ("INFO", LogLevel::Info),
    ("WARNING", LogLevel::Warning),
    ("WARN", LogLevel::Warning),
    ("ERROR", LogLevel::Error),
    ("CRITICAL", LogLevel::Critical),
];

impl LogLevel {
    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// The `tracing` level this maps onto. `tracing` has no level above
    /// ERROR, so CRITICAL collapses into it.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_uppercase();
        LOG_LEVEL_TABLE
            .iter()
            .find(|(level_name, _)| *level_name == name)
            .map(|&(_, level)| level)
            .ok_or_else(|| {
                MonitorError::config_error(format!(
                    "unknown log level '{}'; expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    s
                ))
            })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [sensor]
        location = "greenhouse"
        pin = "D4"

        [logging]
        log_file = "/tmp/dht_exporter/sensor.log"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = MonitorConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.sensor.location, "greenhouse");
        assert_eq!(config.sensor.model, SensorModel::Dht22);
        assert_eq!(config.monitor.read_interval_seconds, 30);
        assert_eq!(config.retry_backoff(), Duration::from_secs(2));
        assert_eq!(config.metrics.port, crate::DEFAULT_METRICS_PORT);
        assert_eq!(config.logging.log_level, LogLevel::Info);
    }

    #[test]
    fn test_pin_table_lookup() {
        assert_eq!("D4".parse::<GpioPin>().unwrap().bcm(), 4);
        assert_eq!("gpio17".parse::<GpioPin>().unwrap().bcm(), 17);
        assert_eq!("BCM22".parse::<GpioPin>().unwrap().bcm(), 22);
        assert_eq!("SDA".parse::<GpioPin>().unwrap().bcm(), 2);
        assert!("D28".parse::<GpioPin>().is_err());
        assert!("P4".parse::<GpioPin>().is_err());
    }

    #[test]
    fn test_unknown_pin_rejected_at_load() {
        let toml = MINIMAL.replace("\"D4\"", "\"D99\"");
        let err = MonitorConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("D99"));
    }

    #[test]
    fn test_log_level_table() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(
            LogLevel::Critical.to_tracing_level(),
            tracing::Level::ERROR
        );
        assert!("VERBOSE".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected_at_load() {
        let toml = format!("{}\nlog_level = \"LOUD\"\n", MINIMAL);
        assert!(MonitorConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_backoff_must_be_shorter_than_interval() {
        let toml = format!(
            "{}\n[monitor]\nread_interval_seconds = 2\nretry_backoff_seconds = 2.0\n",
            MINIMAL
        );
        let err = MonitorConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let toml = format!("{}\n[monitor]\nread_interval_seconds = 0\n", MINIMAL);
        assert!(MonitorConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = MonitorConfig::load("/nonexistent/dht_exporter.toml").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }
}
