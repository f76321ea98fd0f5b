//! DHT22 / DHT11 single-wire sensor support.
//!
//! Frame decoding is plain Rust and compiled everywhere. Talking to the data
//! line needs `rppal` and is feature-gated behind `gpio`; without the feature
//! [`DhtSensor::open`] fails with a startup error.

use crate::sensor::driver::{DriverError, SensorModel};
use std::time::{Duration, Instant};

/// Bytes in one response frame: humidity hi/lo, temperature hi/lo, checksum.
pub const FRAME_BYTES: usize = 5;

/// Data bits in one response frame.
pub const FRAME_BITS: usize = FRAME_BYTES * 8;

/// The sensor refuses to measure more often than this.
pub const MIN_MEASURE_INTERVAL: Duration = Duration::from_secs(2);

/// High pulses longer than this are a `1` bit (`0` is ~27us, `1` is ~70us).
pub const ONE_BIT_THRESHOLD_US: u32 = 48;

/// One decoded measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
}

/// Pack 40 high-pulse widths (microseconds) into frame bytes, MSB first.
pub fn bits_from_pulses(high_widths_us: &[u32]) -> Result<[u8; FRAME_BYTES], DriverError> {
    if high_widths_us.len() != FRAME_BITS {
        return Err(DriverError::timing(format!(
            "expected {} data pulses, got {}",
            FRAME_BITS,
            high_widths_us.len()
        )));
    }

    let mut bytes = [0u8; FRAME_BYTES];
    for (i, &width) in high_widths_us.iter().enumerate() {
        if width > ONE_BIT_THRESHOLD_US {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    Ok(bytes)
}

/// Verify the checksum and decode a frame for the given model.
pub fn decode_frame(model: SensorModel, bytes: [u8; FRAME_BYTES]) -> Result<Frame, DriverError> {
    let sum = bytes[..4]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != bytes[4] {
        return Err(DriverError::checksum(format!(
            "checksum did not validate (0x{:02x} != 0x{:02x})",
            sum, bytes[4]
        )));
    }

    let frame = match model {
        SensorModel::Dht22 => {
            let humidity = u16::from_be_bytes([bytes[0], bytes[1]]) as f64 / 10.0;
            let magnitude = u16::from_be_bytes([bytes[2] & 0x7f, bytes[3]]) as f64 / 10.0;
            let temperature = if bytes[2] & 0x80 != 0 {
                -magnitude
            } else {
                magnitude
            };
            Frame {
                temperature_celsius: temperature,
                humidity_percent: humidity,
            }
        }
        SensorModel::Dht11 => {
            let humidity = bytes[0] as f64 + bytes[1] as f64 / 10.0;
            let magnitude = bytes[2] as f64 + (bytes[3] & 0x0f) as f64 / 10.0;
            let temperature = if bytes[3] & 0x80 != 0 {
                -magnitude
            } else {
                magnitude
            };
            Frame {
                temperature_celsius: temperature,
                humidity_percent: humidity,
            }
        }
    };

    Ok(frame)
}

/// Start-signal low time the host must hold the line for.
pub fn start_signal_low(model: SensorModel) -> Duration {
    match model {
        SensorModel::Dht22 => Duration::from_micros(1_100),
        SensorModel::Dht11 => Duration::from_millis(18),
    }
}

/// Remembers the last good frame so that the temperature and humidity
/// transactions of one tick do not hit the device twice inside its
/// minimum measuring interval.
#[derive(Debug, Clone)]
pub struct FrameCache {
    min_interval: Duration,
    last: Option<(Instant, Frame)>,
}

impl FrameCache {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Cached frame if it is still fresh at `now`.
    pub fn fresh(&self, now: Instant) -> Option<Frame> {
        match self.last {
            Some((at, frame)) if now.saturating_duration_since(at) < self.min_interval => {
                Some(frame)
            }
            _ => None,
        }
    }

    pub fn store(&mut self, now: Instant, frame: Frame) {
        self.last = Some((now, frame));
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(MIN_MEASURE_INTERVAL)
    }
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::config::GpioPin;
    use crate::error::{MonitorError, Result};
    use crate::sensor::driver::SensorDriver;
    use rppal::gpio::{Gpio, IoPin, Level, Mode, PullUpDown};

    /// Longest the sensor may take to begin answering the start signal.
    const RESPONSE_TIMEOUT: Duration = Duration::from_micros(250);
    /// Longest any single pulse inside the frame may last.
    const PULSE_TIMEOUT: Duration = Duration::from_micros(120);

    /// DHT sensor on a Raspberry Pi GPIO line, bit-banged through rppal.
    pub struct DhtSensor {
        model: SensorModel,
        bcm: u8,
        pin: Option<IoPin>,
        cache: FrameCache,
    }

    impl std::fmt::Debug for DhtSensor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DhtSensor")
                .field("model", &self.model)
                .field("bcm", &self.bcm)
                .field("released", &self.pin.is_none())
                .finish_non_exhaustive()
        }
    }

    impl DhtSensor {
        /// Claim the data line. Fails if GPIO is inaccessible or the line is busy.
        pub fn open(model: SensorModel, pin: GpioPin) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                MonitorError::sensor_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            let io = gpio
                .get(pin.bcm())
                .map_err(|e| {
                    MonitorError::sensor_error(format!("Failed to claim pin {}: {}", pin, e))
                })?
                .into_io(Mode::Input);

            tracing::debug!("Opened {} on BCM line {}", model, pin.bcm());

            Ok(Self {
                model,
                bcm: pin.bcm(),
                pin: Some(io),
                cache: FrameCache::default(),
            })
        }

        fn frame(&mut self) -> std::result::Result<Frame, DriverError> {
            let now = Instant::now();
            if let Some(frame) = self.cache.fresh(now) {
                return Ok(frame);
            }

            let model = self.model;
            let pin = self.pin.as_mut().ok_or_else(DriverError::released)?;
            let widths = transact(pin, model)?;
            let frame = decode_frame(model, bits_from_pulses(&widths)?)?;
            self.cache.store(Instant::now(), frame);
            Ok(frame)
        }
    }

    /// Send the start signal and capture the width of every data pulse.
    fn transact(pin: &mut IoPin, model: SensorModel) -> std::result::Result<Vec<u32>, DriverError> {
        pin.set_mode(Mode::Output);
        pin.set_high();
        std::thread::sleep(Duration::from_millis(1));
        pin.set_low();
        std::thread::sleep(start_signal_low(model));
        pin.set_high();
        pin.set_mode(Mode::Input);
        pin.set_pullupdown(PullUpDown::PullUp);

        // Handshake: sensor pulls low ~80us, then high ~80us.
        for level in [Level::Low, Level::High, Level::Low] {
            wait_for(pin, level, RESPONSE_TIMEOUT).ok_or_else(|| {
                DriverError::no_response("DHT sensor not found, check wiring")
            })?;
        }

        let mut widths = Vec::with_capacity(FRAME_BITS);
        for bit in 0..FRAME_BITS {
            wait_for(pin, Level::High, PULSE_TIMEOUT).ok_or_else(|| {
                DriverError::timing(format!("timed out waiting for bit {} start", bit))
            })?;
            let high = wait_for(pin, Level::Low, PULSE_TIMEOUT).ok_or_else(|| {
                DriverError::timing(format!("timed out waiting for bit {} end", bit))
            })?;
            widths.push(high.as_micros() as u32);
        }

        Ok(widths)
    }

    /// Spin until the line reads `level`; returns how long that took.
    fn wait_for(pin: &IoPin, level: Level, timeout: Duration) -> Option<Duration> {
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if pin.read() == level {
                return Some(elapsed);
            }
            if elapsed > timeout {
                return None;
            }
        }
    }

    impl SensorDriver for DhtSensor {
        fn sensor_type(&self) -> &'static str {
            self.model.as_str()
        }

        fn temperature(&mut self) -> std::result::Result<Option<f64>, DriverError> {
            self.frame().map(|f| Some(f.temperature_celsius))
        }

        fn humidity(&mut self) -> std::result::Result<Option<f64>, DriverError> {
            self.frame().map(|f| Some(f.humidity_percent))
        }

        fn release(&mut self) {
            if let Some(pin) = self.pin.take() {
                // Dropping the IoPin hands the line back to the kernel.
                drop(pin);
                self.cache.clear();
                tracing::debug!("Released BCM line {}", self.bcm);
            }
        }
    }

    impl Drop for DhtSensor {
        fn drop(&mut self) {
            self.release();
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod unavailable {
    use super::*;
    use crate::config::GpioPin;
    use crate::error::{MonitorError, Result};
    use crate::sensor::driver::SensorDriver;

    /// Placeholder for builds without GPIO support. It can never be opened.
    #[derive(Debug)]
    pub struct DhtSensor {
        model: SensorModel,
    }

    impl DhtSensor {
        pub fn open(model: SensorModel, pin: GpioPin) -> Result<Self> {
            Err(MonitorError::sensor_error(format!(
                "cannot open {} on {}: GPIO support not compiled in \
                 (rebuild with --features gpio, or run with --simulate)",
                model, pin
            )))
        }
    }

    impl SensorDriver for DhtSensor {
        fn sensor_type(&self) -> &'static str {
            self.model.as_str()
        }

        fn temperature(&mut self) -> std::result::Result<Option<f64>, DriverError> {
            Err(DriverError::released())
        }

        fn humidity(&mut self) -> std::result::Result<Option<f64>, DriverError> {
            Err(DriverError::released())
        }

        fn release(&mut self) {}
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::DhtSensor;

#[cfg(not(feature = "gpio"))]
pub use unavailable::DhtSensor;
