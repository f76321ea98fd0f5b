//! The hardware boundary: one trait every temperature/humidity source implements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported sensor models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorModel {
    /// DHT22 / AM2302
    #[default]
    Dht22,
    /// DHT11
    Dht11,
}

impl SensorModel {
    /// Label value used for the `sensor_type` metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorModel::Dht22 => "DHT22",
            SensorModel::Dht11 => "DHT11",
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a driver.
///
/// Drivers tag every failure explicitly so callers never have to guess
/// from message text whether a fault is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// Frame checksum did not match its payload
    Checksum,
    /// A pulse arrived too late or too early
    Timing,
    /// The sensor did not answer the start signal
    NoResponse,
    /// The bus or GPIO line itself failed
    Bus,
    /// The process ran out of a resource (permissions, handles, memory)
    Resource,
    /// The driver was used after `release()`
    Released,
    /// Anything else
    Other,
}

impl DriverErrorKind {
    /// Known intermittent conditions that a later attempt can clear.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            DriverErrorKind::Checksum | DriverErrorKind::Timing | DriverErrorKind::NoResponse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriverErrorKind::Checksum => "checksum",
            DriverErrorKind::Timing => "timing",
            DriverErrorKind::NoResponse => "no_response",
            DriverErrorKind::Bus => "bus",
            DriverErrorKind::Resource => "resource",
            DriverErrorKind::Released => "released",
            DriverErrorKind::Other => "other",
        }
    }
}

/// Error raised by a [`SensorDriver`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn checksum(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Checksum, message)
    }

    pub fn timing(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Timing, message)
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::NoResponse, message)
    }

    pub fn bus(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Bus, message)
    }

    pub fn released() -> Self {
        Self::new(DriverErrorKind::Released, "sensor handle already released")
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One raw pair of values as reported by a driver. `None` means the device
/// produced no data for that channel without raising an error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
}

/// A temperature/humidity source.
///
/// Each channel read is its own hardware transaction. Implementations return
/// promptly or fail; callers add no timeout of their own.
pub trait SensorDriver: Send {
    /// Label value for the `sensor_type` metric label.
    fn sensor_type(&self) -> &'static str;

    /// Read the temperature in degrees Celsius.
    fn temperature(&mut self) -> Result<Option<f64>, DriverError>;

    /// Read the relative humidity in percent.
    fn humidity(&mut self) -> Result<Option<f64>, DriverError>;

    /// Read both channels. Both transactions must succeed.
    fn sample(&mut self) -> Result<RawSample, DriverError> {
        let temperature_celsius = self.temperature()?;
        let humidity_percent = self.humidity()?;
        Ok(RawSample {
            temperature_celsius,
            humidity_percent,
        })
    }

    /// Tear down the underlying hardware handle. Calling it more than once
    /// must be harmless.
    fn release(&mut self);
}

impl<T: SensorDriver + ?Sized> SensorDriver for Box<T> {
    fn sensor_type(&self) -> &'static str {
        (**self).sensor_type()
    }

    fn temperature(&mut self) -> Result<Option<f64>, DriverError> {
        (**self).temperature()
    }

    fn humidity(&mut self) -> Result<Option<f64>, DriverError> {
        (**self).humidity()
    }

    fn sample(&mut self) -> Result<RawSample, DriverError> {
        (**self).sample()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl SensorDriver for Fixed {
        fn sensor_type(&self) -> &'static str {
            "FIXED"
        }

        fn temperature(&mut self) -> Result<Option<f64>, DriverError> {
            Ok(Some(21.5))
        }

        fn humidity(&mut self) -> Result<Option<f64>, DriverError> {
            Err(DriverError::checksum("bad checksum"))
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_transient_kinds() {
        assert!(DriverErrorKind::Checksum.is_transient());
        assert!(DriverErrorKind::Timing.is_transient());
        assert!(DriverErrorKind::NoResponse.is_transient());
        assert!(!DriverErrorKind::Bus.is_transient());
        assert!(!DriverErrorKind::Resource.is_transient());
        assert!(!DriverErrorKind::Released.is_transient());
        assert!(!DriverErrorKind::Other.is_transient());
    }

    #[test]
    fn test_sample_requires_both_channels() {
        let mut driver = Fixed;
        let err = driver.sample().unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Checksum);
    }

    #[test]
    fn test_model_serialization() {
        let json = serde_json::to_string(&SensorModel::Dht11).unwrap();
        assert_eq!(json, "\"DHT11\"");
        let model: SensorModel = serde_json::from_str("\"DHT22\"").unwrap();
        assert_eq!(model, SensorModel::Dht22);
    }
}
