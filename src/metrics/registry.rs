//! Prometheus gauges for the current sensor state.
//!
//! The monitor loop is the only writer. The HTTP listener only calls
//! [`MetricRegistry::render`]. Every multi-gauge update happens under the
//! write half of `publish`, and rendering holds the read half, so a scrape
//! sees either all values of a tick or none of them.

use crate::error::{MonitorError, Result};
use crate::monitor::{DerivedReading, SensorIdentity};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const TEMP_C: &str = "temp_c";
pub const TEMP_F: &str = "temp_f";
pub const HUMIDITY: &str = "humidity_pct";
pub const READ_ERRORS: &str = "sensor_read_errors_total";
pub const LAST_SUCCESS: &str = "sensor_last_successful_read_timestamp";
pub const SENSOR_INFO: &str = "sensor_info";

const READING_LABELS: &[&str] = &["location", "sensor_type", "hostname"];
const HEALTH_LABELS: &[&str] = &["location", "hostname"];
const INFO_LABELS: &[&str] = &["location", "sensor_type", "hostname", "version"];

/// Holds the exported gauges for one sensor identity.
pub struct MetricRegistry {
    registry: Registry,
    identity: SensorIdentity,
    temp_c: GaugeVec,
    temp_f: GaugeVec,
    humidity: GaugeVec,
    read_errors: GaugeVec,
    last_success: GaugeVec,
    info: IntGaugeVec,
    publish: RwLock<()>,
}

impl MetricRegistry {
    /// Register all gauge families. The error gauge starts at zero so its
    /// rate is defined from the first scrape.
    pub fn new(identity: SensorIdentity) -> Result<Self> {
        let registry = Registry::new();

        let temp_c = GaugeVec::new(Opts::new(TEMP_C, "Temperature in Celsius"), READING_LABELS)?;
        let temp_f = GaugeVec::new(Opts::new(TEMP_F, "Temperature in Fahrenheit"), READING_LABELS)?;
        let humidity = GaugeVec::new(Opts::new(HUMIDITY, "Humidity percentage"), READING_LABELS)?;
        let read_errors = GaugeVec::new(
            Opts::new(READ_ERRORS, "Total number of sensor read errors"),
            HEALTH_LABELS,
        )?;
        let last_success = GaugeVec::new(
            Opts::new(LAST_SUCCESS, "Timestamp of last successful sensor read"),
            HEALTH_LABELS,
        )?;
        let info = IntGaugeVec::new(Opts::new(SENSOR_INFO, "Sensor information"), INFO_LABELS)?;

        registry.register(Box::new(temp_c.clone()))?;
        registry.register(Box::new(temp_f.clone()))?;
        registry.register(Box::new(humidity.clone()))?;
        registry.register(Box::new(read_errors.clone()))?;
        registry.register(Box::new(last_success.clone()))?;
        registry.register(Box::new(info.clone()))?;

        let metrics = Self {
            registry,
            identity,
            temp_c,
            temp_f,
            humidity,
            read_errors,
            last_success,
            info,
            publish: RwLock::new(()),
        };
        metrics.set_error_count(0);

        Ok(metrics)
    }

    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }

    /// Publish the static info record. Called once at startup.
    pub fn set_info(&self, version: &str) {
        let _guard = self.write_guard();
        let id = &self.identity;
        self.info
            .with_label_values(&[
                id.location.as_str(),
                id.sensor_type.as_str(),
                id.hostname.as_str(),
                version,
            ])
            .set(1);
    }

    /// Write all four per-tick gauge families as one unit.
    pub fn record_reading(&self, reading: &DerivedReading) {
        let _guard = self.write_guard();
        let labels = [
            reading.location.as_str(),
            reading.sensor_type.as_str(),
            reading.hostname.as_str(),
        ];

        self.temp_c
            .with_label_values(&labels)
            .set(reading.temperature_celsius);
        self.temp_f
            .with_label_values(&labels)
            .set(reading.temperature_fahrenheit);
        self.humidity
            .with_label_values(&labels)
            .set(reading.humidity_percent);
        self.last_success
            .with_label_values(&[reading.location.as_str(), reading.hostname.as_str()])
            .set(unix_seconds(reading.observed_at));
    }

    /// Overwrite the cumulative read error gauge.
    pub fn set_error_count(&self, count: u64) {
        let _guard = self.write_guard();
        self.read_errors
            .with_label_values(&[
                self.identity.location.as_str(),
                self.identity.hostname.as_str(),
            ])
            .set(count as f64);
    }

    /// Encode every family in the text exposition format.
    pub fn render(&self) -> Result<String> {
        let families = {
            let _guard = self.read_guard();
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| MonitorError::metrics_error(format!("exposition is not UTF-8: {}", e)))
    }

    /// Content type of [`render`](Self::render) output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current value of a gauge family, or `None` if it was never set.
    pub fn gauge_value(&self, family: &str) -> Option<f64> {
        let _guard = self.read_guard();
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.get_name() == family)
            .and_then(|mf| mf.get_metric().first())
            .map(|m| m.get_gauge().get_value())
    }

    pub fn temperature_celsius(&self) -> Option<f64> {
        self.gauge_value(TEMP_C)
    }

    pub fn temperature_fahrenheit(&self) -> Option<f64> {
        self.gauge_value(TEMP_F)
    }

    pub fn humidity_percent(&self) -> Option<f64> {
        self.gauge_value(HUMIDITY)
    }

    pub fn error_count(&self) -> u64 {
        self.gauge_value(READ_ERRORS).unwrap_or_default() as u64
    }

    /// Unix seconds of the last successful read.
    pub fn last_success_timestamp(&self) -> Option<f64> {
        self.gauge_value(LAST_SUCCESS)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.publish.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.publish.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fractional Unix seconds, the unit Prometheus timestamps use.
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ValidSample;

    fn registry() -> MetricRegistry {
        MetricRegistry::new(SensorIdentity::new("lab", "DHT22", "pi-1")).unwrap()
    }

    fn reading(c: f64, h: f64) -> DerivedReading {
        let sample = ValidSample {
            temperature_celsius: c,
            humidity_percent: h,
            captured_at: Utc::now(),
        };
        DerivedReading::from_sample(&sample, &SensorIdentity::new("lab", "DHT22", "pi-1"))
    }

    #[test]
    fn test_scrape_never_sees_a_partial_reading() {
        use crate::monitor::celsius_to_fahrenheit;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let metrics = Arc::new(registry());
        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let metrics = metrics.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut value = 0.0;
                while !stop.load(Ordering::Relaxed) {
                    value += 1.0;
                    metrics.record_reading(&reading(value, value));
                }
            })
        };

        for _ in 0..5_000 {
            let text = metrics.render().unwrap();
            let value = |name: &str| {
                text.lines()
                    .find(|l| l.starts_with(&format!("{}{{", name)))
                    .and_then(|l| l.rsplit(' ').next())
                    .map(|v| v.parse::<f64>().unwrap())
            };

            if let (Some(c), Some(f), Some(h)) = (value(TEMP_C), value(TEMP_F), value(HUMIDITY)) {
                assert_eq!(c, h, "temperature and humidity from different readings");
                assert_eq!(f, celsius_to_fahrenheit(c));
            }
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }

    #[test]
    fn test_new_registry_exposes_only_error_gauge() {
        let metrics = registry();
        assert_eq!(metrics.temperature_celsius(), None);
        assert_eq!(metrics.last_success_timestamp(), None);
        assert_eq!(metrics.error_count(), 0);
    }

    #[test]
    fn test_record_reading_sets_all_families() {
        let metrics = registry();
        let r = reading(20.0, 45.3);
        metrics.record_reading(&r);

        assert_eq!(metrics.temperature_celsius(), Some(20.0));
        assert_eq!(metrics.temperature_fahrenheit(), Some(68.0));
        assert_eq!(metrics.humidity_percent(), Some(45.3));
        assert_eq!(
            metrics.last_success_timestamp(),
            Some(unix_seconds(r.observed_at))
        );
    }

    #[test]
    fn test_render_text_format() {
        let metrics = registry();
        metrics.set_info("1.2.3");
        metrics.record_reading(&reading(21.5, 40.0));
        metrics.set_error_count(3);

        let text = metrics.render().unwrap();
        let line = |name: &str| {
            text.lines()
                .find(|l| l.starts_with(&format!("{}{{", name)))
                .unwrap_or_else(|| panic!("no sample line for {}", name))
                .to_string()
        };

        assert!(text.contains("# TYPE temp_c gauge"));
        let temp = line(TEMP_C);
        assert!(temp.contains(r#"location="lab""#));
        assert!(temp.contains(r#"sensor_type="DHT22""#));
        assert!(temp.ends_with(" 21.5"));

        let errors = line(READ_ERRORS);
        assert!(errors.contains(r#"hostname="pi-1""#));
        assert!(!errors.contains("sensor_type"));
        assert!(errors.ends_with(" 3"));

        let info = line(SENSOR_INFO);
        assert!(info.contains(r#"version="1.2.3""#));
        assert!(info.ends_with(" 1"));
        assert!(metrics.content_type().starts_with("text/plain"));
    }
}
