//! State owned by the monitor loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorPhase {
    /// Sleeping between ticks
    Idle,
    /// A read is in flight
    Reading,
    /// Fatal error or shutdown; the sensor is being released
    Terminating,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorPhase::Idle => "idle",
            MonitorPhase::Reading => "reading",
            MonitorPhase::Terminating => "terminating",
        };
        f.write_str(name)
    }
}

/// Cumulative error count and time of the last good read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    error_count: u64,
    last_success: Option<DateTime<Utc>>,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transient faults seen since startup.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Count one transient fault and return the new total.
    pub fn record_transient_error(&mut self) -> u64 {
        self.error_count = self.error_count.saturating_add(1);
        self.error_count
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_success = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_count_only_grows() {
        let mut state = LoopState::new();
        assert_eq!(state.record_transient_error(), 1);
        assert_eq!(state.record_transient_error(), 2);
        state.record_success(Utc::now());
        assert_eq!(state.error_count(), 2);
    }

    #[test]
    fn test_last_success_starts_unset() {
        let mut state = LoopState::new();
        assert!(state.last_success().is_none());
        let now = Utc::now();
        state.record_success(now);
        assert_eq!(state.last_success(), Some(now));
    }
}
