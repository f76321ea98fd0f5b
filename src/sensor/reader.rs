//! Acquisition and validation boundary between the monitor loop and a driver.

use crate::sensor::driver::{DriverError, SensorDriver};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Temperature in Celsius, `None` if the device produced no value
    pub temperature_celsius: Option<f64>,
    /// Relative humidity in percent, `None` if the device produced no value
    pub humidity_percent: Option<f64>,
    /// When the read started
    pub captured_at: DateTime<Utc>,
}

/// A sample with both channels present and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidSample {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub captured_at: DateTime<Utc>,
}

/// Which channel(s) came back without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MissingReading {
    #[error("Received no value for temperature")]
    Temperature,
    #[error("Received no value for humidity")]
    Humidity,
    #[error("Received no value for temperature and humidity")]
    Both,
}

impl Sample {
    /// Split into a publishable sample or the channels that were missing.
    pub fn validate(&self) -> Result<ValidSample, MissingReading> {
        match (self.temperature_celsius, self.humidity_percent) {
            (Some(temperature_celsius), Some(humidity_percent)) => Ok(ValidSample {
                temperature_celsius,
                humidity_percent,
                captured_at: self.captured_at,
            }),
            (None, Some(_)) => Err(MissingReading::Temperature),
            (Some(_), None) => Err(MissingReading::Humidity),
            (None, None) => Err(MissingReading::Both),
        }
    }
}

/// Classified driver failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// Known intermittent hardware condition; the loop backs off and retries.
    #[error("{0}")]
    Transient(String),
    /// Anything else; the loop releases the sensor and stops.
    #[error("{0}")]
    Fatal(String),
}

impl ReadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ReadError::Transient(_))
    }
}

impl From<DriverError> for ReadError {
    fn from(err: DriverError) -> Self {
        if err.kind().is_transient() {
            ReadError::Transient(err.message().to_string())
        } else {
            ReadError::Fatal(format!("{} ({})", err.message(), err.kind().as_str()))
        }
    }
}

/// Wraps a driver and turns each invocation into a [`Sample`] or a
/// classified [`ReadError`]. Writes no metrics.
pub struct SampleReader<D> {
    driver: D,
}

impl<D: SensorDriver> SampleReader<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Take one temperature and one humidity reading.
    ///
    /// Non-finite values are reported as missing, never as errors.
    pub fn read(&mut self) -> Result<Sample, ReadError> {
        let captured_at = Utc::now();
        let raw = self.driver.sample()?;

        Ok(Sample {
            temperature_celsius: raw.temperature_celsius.filter(|v| v.is_finite()),
            humidity_percent: raw.humidity_percent.filter(|v| v.is_finite()),
            captured_at,
        })
    }

    pub fn sensor_type(&self) -> &'static str {
        self.driver.sensor_type()
    }

    /// Release the wrapped driver.
    pub fn release(&mut self) {
        self.driver.release();
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D> fmt::Debug for SampleReader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleReader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::driver::DriverErrorKind;
    use std::collections::VecDeque;

    type Step = Result<Option<f64>, DriverError>;

    struct Scripted {
        temperatures: VecDeque<Step>,
        humidities: VecDeque<Step>,
    }

    impl Scripted {
        fn new(temperatures: Vec<Step>, humidities: Vec<Step>) -> Self {
            Self {
                temperatures: temperatures.into(),
                humidities: humidities.into(),
            }
        }
    }

    impl SensorDriver for Scripted {
        fn sensor_type(&self) -> &'static str {
            "SCRIPTED"
        }

        fn temperature(&mut self) -> Result<Option<f64>, DriverError> {
            self.temperatures.pop_front().unwrap_or(Ok(None))
        }

        fn humidity(&mut self) -> Result<Option<f64>, DriverError> {
            self.humidities.pop_front().unwrap_or(Ok(None))
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_valid_read() {
        let mut reader =
            SampleReader::new(Scripted::new(vec![Ok(Some(20.0))], vec![Ok(Some(45.3))]));
        let sample = reader.read().unwrap();
        let valid = sample.validate().unwrap();
        assert_eq!(valid.temperature_celsius, 20.0);
        assert_eq!(valid.humidity_percent, 45.3);
    }

    #[test]
    fn test_missing_channels_are_not_errors() {
        let mut reader = SampleReader::new(Scripted::new(
            vec![Ok(None), Ok(Some(20.0)), Ok(None)],
            vec![Ok(Some(40.0)), Ok(None), Ok(None)],
        ));
        assert_eq!(
            reader.read().unwrap().validate(),
            Err(MissingReading::Temperature)
        );
        assert_eq!(reader.read().unwrap().validate(), Err(MissingReading::Humidity));
        assert_eq!(reader.read().unwrap().validate(), Err(MissingReading::Both));
    }

    #[test]
    fn test_nan_is_missing() {
        let mut reader =
            SampleReader::new(Scripted::new(vec![Ok(Some(f64::NAN))], vec![Ok(Some(40.0))]));
        let sample = reader.read().unwrap();
        assert_eq!(sample.temperature_celsius, None);
        assert_eq!(sample.validate(), Err(MissingReading::Temperature));
    }

    #[test]
    fn test_classification() {
        for kind in [
            DriverErrorKind::Checksum,
            DriverErrorKind::Timing,
            DriverErrorKind::NoResponse,
        ] {
            let err = ReadError::from(DriverError::new(kind, "flaky"));
            assert!(err.is_transient(), "{:?} should be transient", kind);
        }

        for kind in [
            DriverErrorKind::Bus,
            DriverErrorKind::Resource,
            DriverErrorKind::Released,
            DriverErrorKind::Other,
        ] {
            let err = ReadError::from(DriverError::new(kind, "broken"));
            assert!(!err.is_transient(), "{:?} should be fatal", kind);
        }
    }

    #[test]
    fn test_humidity_failure_fails_whole_read() {
        let mut reader = SampleReader::new(Scripted::new(
            vec![Ok(Some(20.0))],
            vec![Err(DriverError::timing("late pulse"))],
        ));
        assert_eq!(
            reader.read().unwrap_err(),
            ReadError::Transient("late pulse".to_string())
        );
    }
}
