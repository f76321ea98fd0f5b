//! Error handling for the DHT exporter crate.

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for the exporter.
///
/// Transient sensor faults never surface here: they are absorbed by the
/// monitor loop. Everything in this enum ends the process with a non-zero
/// exit code.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file missing, unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sensor could not be opened at startup
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Unrecoverable sensor failure raised by the monitor loop
    #[error("Fatal sensor error: {0}")]
    FatalSensor(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Logging setup failed
    #[error("Logging error: {0}")]
    Logging(String),
}

impl MonitorError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new sensor startup error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a new fatal sensor error
    pub fn fatal_sensor_error(msg: impl Into<String>) -> Self {
        Self::FatalSensor(msg.into())
    }

    /// Create a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new logging error
    pub fn logging_error(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }

    /// Whether this error came from the sensor at runtime.
    pub fn is_fatal_sensor(&self) -> bool {
        matches!(self, Self::FatalSensor(_))
    }
}

impl From<prometheus::Error> for MonitorError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}
