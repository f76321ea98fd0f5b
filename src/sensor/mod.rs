//! Sensor access: the driver trait, hardware and simulated drivers, and the
//! sample reader that classifies driver failures.

pub mod dht;
pub mod driver;
pub mod reader;
pub mod simulated;

// Re-export commonly used items
pub use dht::DhtSensor;
pub use driver::{DriverError, DriverErrorKind, RawSample, SensorDriver, SensorModel};
pub use reader::{MissingReading, ReadError, Sample, SampleReader, ValidSample};
pub use simulated::SimulatedSensor;
