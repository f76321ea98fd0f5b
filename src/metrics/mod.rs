//! Exported metric state.
//!
//! The registry is shared between the monitor loop (writer) and the HTTP
//! listener (reader) and owns its own synchronization.

pub mod registry;

// Re-export commonly used items
pub use registry::{unix_seconds, MetricRegistry};
