//! Synthetic sensor for running the exporter on machines without a DHT wired up.

use crate::sensor::driver::{DriverError, SensorDriver};

/// Produces a slow sine drift around fixed base values and injects a
/// checksum fault every `fault_every` measurements.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    base_celsius: f64,
    base_humidity: f64,
    step: u64,
    fault_every: Option<u64>,
    released: bool,
}

impl SimulatedSensor {
    pub fn new(base_celsius: f64, base_humidity: f64) -> Self {
        Self {
            base_celsius,
            base_humidity,
            step: 0,
            fault_every: None,
            released: false,
        }
    }

    /// Fail every `n`th temperature transaction with a transient fault.
    pub fn with_fault_every(mut self, n: u64) -> Self {
        self.fault_every = (n > 0).then_some(n);
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn phase(&self) -> f64 {
        self.step as f64 * 0.1
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(21.0, 45.0).with_fault_every(7)
    }
}

impl SensorDriver for SimulatedSensor {
    fn sensor_type(&self) -> &'static str {
        "SIMULATED"
    }

    fn temperature(&mut self) -> Result<Option<f64>, DriverError> {
        if self.released {
            return Err(DriverError::released());
        }

        self.step += 1;
        if let Some(n) = self.fault_every {
            if self.step % n == 0 {
                return Err(DriverError::checksum("simulated checksum mismatch"));
            }
        }

        Ok(Some(self.base_celsius + 2.0 * self.phase().sin()))
    }

    fn humidity(&mut self) -> Result<Option<f64>, DriverError> {
        if self.released {
            return Err(DriverError::released());
        }

        let humidity = self.base_humidity + 5.0 * self.phase().cos();
        Ok(Some(humidity.clamp(0.0, 100.0)))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
