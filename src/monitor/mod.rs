//! The acquisition loop and everything it decides on its own: unit
//! conversion, retry policy and loop state.

pub mod convert;
pub mod retry;
pub mod runner;
pub mod state;

// Re-export commonly used items
pub use convert::{celsius_to_fahrenheit, local_hostname, DerivedReading, SensorIdentity};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{LoopSettings, MonitorLoop, TickOutcome};
pub use state::{LoopState, MonitorPhase};
