//! # DHT Exporter - Temperature and Humidity Metrics for Raspberry Pi
//!
//! A small daemon crate that reads a DHT22 (or DHT11) sensor on a fixed
//! cadence and exposes the readings as Prometheus gauges over HTTP.
//!
//! ## Features
//!
//! - **Sample loop**: fixed interval, short fixed backoff on transient faults
//! - **Error classification**: transient faults are counted and retried,
//!   fatal faults release the sensor and stop the process
//! - **Prometheus endpoint**: `GET /metrics` in the text exposition format
//! - **GPIO driver**: bit-banged DHT protocol via `rppal` (feature-gated)
//! - **Simulated sensor**: run anywhere with `--simulate`
//!
//! ## Exported metrics
//!
//! | Name | Labels |
//! |------|--------|
//! | `temp_c`, `temp_f`, `humidity_pct` | `location`, `sensor_type`, `hostname` |
//! | `sensor_read_errors_total`, `sensor_last_successful_read_timestamp` | `location`, `hostname` |
//! | `sensor_info` | `location`, `sensor_type`, `hostname`, `version` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dht_exporter::{
//!     start_metrics_server, LoopSettings, MetricRegistry, MonitorLoop, SensorIdentity,
//!     SimulatedSensor, WebConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = SensorIdentity::new("office", "SIMULATED", "pi");
//!     let metrics = Arc::new(MetricRegistry::new(identity)?);
//!
//!     tokio::spawn(start_metrics_server(WebConfig::default(), metrics.clone()));
//!
//!     MonitorLoop::new(SimulatedSensor::default(), metrics, LoopSettings::default())
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod sensor;
pub mod web;

// Re-export public API
pub use config::{GpioPin, LogLevel, MonitorConfig};
pub use error::{MonitorError, Result};
pub use metrics::MetricRegistry;
pub use monitor::{
    celsius_to_fahrenheit, DerivedReading, LoopSettings, LoopState, MonitorLoop, MonitorPhase,
    RetryDecision, RetryPolicy, SensorIdentity, TickOutcome,
};
pub use sensor::{
    DhtSensor, DriverError, DriverErrorKind, ReadError, Sample, SampleReader, SensorDriver,
    SensorModel, SimulatedSensor,
};
pub use web::{start_metrics_server, WebConfig};

/// Default seconds slept between reads
pub const DEFAULT_READ_INTERVAL_SECS: u64 = 30;

/// Default seconds slept after a transient sensor fault
pub const DEFAULT_RETRY_BACKOFF_SECS: f64 = 2.0;

/// Default metrics listener port
pub const DEFAULT_METRICS_PORT: u16 = 9100;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
