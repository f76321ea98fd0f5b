//! What the loop does after a failed read.

use crate::sensor::ReadError;
use std::time::Duration;

/// Outcome of classifying a [`ReadError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after this delay. The delay replaces the normal interval.
    Retry(Duration),
    /// Stop the loop.
    Abort(String),
}

/// Fixed-backoff policy: transient faults retry after `backoff`, fatal
/// faults abort. There is no growth and no retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn decide(&self, err: &ReadError) -> RetryDecision {
        match err {
            ReadError::Transient(_) => RetryDecision::Retry(self.backoff),
            ReadError::Fatal(reason) => RetryDecision::Abort(reason.clone()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs_f64(crate::DEFAULT_RETRY_BACKOFF_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_retries_after_backoff() {
        let policy = RetryPolicy::new(Duration::from_millis(1500));
        assert_eq!(
            policy.decide(&ReadError::Transient("checksum".into())),
            RetryDecision::Retry(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_fatal_aborts_with_reason() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(&ReadError::Fatal("bus gone".into())),
            RetryDecision::Abort("bus gone".into())
        );
    }

    #[test]
    fn test_default_backoff() {
        assert_eq!(RetryPolicy::default().backoff(), Duration::from_secs(2));
    }
}
