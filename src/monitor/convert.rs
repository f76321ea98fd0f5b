//! Unit conversion and the derived reading published each successful tick.

use crate::sensor::ValidSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Static labels known at startup and attached to every reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIdentity {
    pub location: String,
    pub sensor_type: String,
    pub hostname: String,
}

impl SensorIdentity {
    pub fn new(
        location: impl Into<String>,
        sensor_type: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            sensor_type: sensor_type.into(),
            hostname: hostname.into(),
        }
    }
}

/// Hostname of this machine, or `unknown`.
pub fn local_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// A validated sample with its Fahrenheit value and identity labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedReading {
    pub temperature_celsius: f64,
    pub temperature_fahrenheit: f64,
    pub humidity_percent: f64,
    pub location: String,
    pub sensor_type: String,
    pub hostname: String,
    pub observed_at: DateTime<Utc>,
}

impl DerivedReading {
    pub fn from_sample(sample: &ValidSample, identity: &SensorIdentity) -> Self {
        Self {
            temperature_celsius: sample.temperature_celsius,
            temperature_fahrenheit: celsius_to_fahrenheit(sample.temperature_celsius),
            humidity_percent: sample.humidity_percent,
            location: identity.location.clone(),
            sensor_type: identity.sensor_type.clone(),
            hostname: identity.hostname.clone(),
            observed_at: sample.captured_at,
        }
    }
}

/// One-line human summary; values are rounded for display only.
impl fmt::Display for DerivedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "✓ Temp: {:.1}°F ({:.1}°C), Humidity: {:.1}%",
            self.temperature_fahrenheit, self.temperature_celsius, self.humidity_percent
        )
    }
}
