//! The acquisition loop.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::metrics::MetricRegistry;
use crate::monitor::convert::{DerivedReading, SensorIdentity};
use crate::monitor::retry::{RetryDecision, RetryPolicy};
use crate::monitor::state::{LoopState, MonitorPhase};
use crate::sensor::{MissingReading, SampleReader, SensorDriver};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Cadence settings for [`MonitorLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Sleep after a completed tick
    pub interval: Duration,
    /// Sleep after a transient fault, instead of `interval`
    pub retry_backoff: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            interval: config.read_interval(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::DEFAULT_READ_INTERVAL_SECS),
            retry_backoff: Duration::from_secs_f64(crate::DEFAULT_RETRY_BACKOFF_SECS),
        }
    }
}

/// What one Reading phase produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Valid sample converted and written to the registry
    Published(DerivedReading),
    /// A channel had no data; nothing was written
    Skipped(MissingReading),
    /// Transient fault counted; next read after `delay`
    Retrying { error_count: u64, delay: Duration },
    /// Fatal fault; the loop must terminate
    Aborted(String),
}

impl TickOutcome {
    /// Sleep before the next Reading phase, `None` if there is no next one.
    pub fn next_delay(&self, interval: Duration) -> Option<Duration> {
        match self {
            TickOutcome::Published(_) | TickOutcome::Skipped(_) => Some(interval),
            TickOutcome::Retrying { delay, .. } => Some(*delay),
            TickOutcome::Aborted(_) => None,
        }
    }
}

/// Drives a [`SampleReader`] at a fixed cadence and publishes into a
/// [`MetricRegistry`].
///
/// Ticks run strictly one after another. The interval is slept *after* each
/// tick's work. A transient fault replaces that sleep with the shorter retry
/// backoff. Shutdown is only noticed while idle.
pub struct MonitorLoop<D: SensorDriver> {
    reader: SampleReader<D>,
    metrics: Arc<MetricRegistry>,
    identity: SensorIdentity,
    settings: LoopSettings,
    policy: RetryPolicy,
    state: LoopState,
    phase: MonitorPhase,
    shutdown: Option<watch::Receiver<bool>>,
    released: bool,
}

impl<D: SensorDriver> MonitorLoop<D> {
    pub fn new(driver: D, metrics: Arc<MetricRegistry>, settings: LoopSettings) -> Self {
        let identity = metrics.identity().clone();
        Self {
            reader: SampleReader::new(driver),
            metrics,
            identity,
            policy: RetryPolicy::new(settings.retry_backoff),
            settings,
            state: LoopState::new(),
            phase: MonitorPhase::Idle,
            shutdown: None,
            released: false,
        }
    }

    /// Stop at the next idle point once `true` is sent on this channel.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Run one Reading phase and apply its effects to state, metrics and log.
    pub fn tick(&mut self) -> TickOutcome {
        self.phase = MonitorPhase::Reading;

        let sample = match self.reader.read() {
            Ok(sample) => sample,
            Err(err) => {
                return match self.policy.decide(&err) {
                    RetryDecision::Retry(delay) => {
                        let error_count = self.state.record_transient_error();
                        self.metrics.set_error_count(error_count);
                        warn!("Sensor read error (total: {}): {}", error_count, err);
                        TickOutcome::Retrying { error_count, delay }
                    }
                    RetryDecision::Abort(reason) => {
                        error!("Critical sensor error: {}", reason);
                        self.phase = MonitorPhase::Terminating;
                        TickOutcome::Aborted(reason)
                    }
                };
            }
        };

        match sample.validate() {
            Ok(valid) => {
                let reading = DerivedReading::from_sample(&valid, &self.identity);
                self.metrics.record_reading(&reading);
                self.state.record_success(valid.captured_at);
                info!("{}", reading);
                TickOutcome::Published(reading)
            }
            Err(missing) => {
                warn!("{}", missing);
                TickOutcome::Skipped(missing)
            }
        }
    }

    /// Loop until a fatal fault or a shutdown request.
    ///
    /// Returns the final state on graceful shutdown and
    /// [`MonitorError::FatalSensor`] on a fatal fault. The sensor is
    /// released exactly once on both paths.
    ///
    /// Driver reads block the calling thread. On a multi-threaded runtime
    /// each read runs under [`task::block_in_place`], so other tasks keep
    /// their worker while the sensor is bit-banged. On a current-thread
    /// runtime the read blocks the runtime for its duration.
    pub async fn run(mut self) -> Result<LoopState> {
        info!("Temperature monitoring started for {}", self.identity.location);

        loop {
            if self.shutdown_requested() {
                return Ok(self.terminate());
            }

            let outcome = blocking(|| self.tick());
            let delay = match outcome.next_delay(self.settings.interval) {
                Some(delay) => delay,
                None => {
                    let reason = match outcome {
                        TickOutcome::Aborted(reason) => reason,
                        _ => String::from("sensor aborted"),
                    };
                    self.terminate();
                    return Err(MonitorError::fatal_sensor_error(reason));
                }
            };

            debug!("Next read in {:?}", delay);
            if self.idle(delay).await {
                return Ok(self.terminate());
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
    async fn idle(&mut self, delay: Duration) -> bool {
        self.phase = MonitorPhase::Idle;

        let Some(mut rx) = self.shutdown.take() else {
            time::sleep(delay).await;
            return false;
        };

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        let mut sender_gone = false;
        let requested = loop {
            tokio::select! {
                _ = &mut sleep => break false,
                changed = rx.changed() => match changed {
                    Ok(()) if *rx.borrow() => break true,
                    Ok(()) => {}
                    Err(_) => {
                        sender_gone = true;
                        (&mut sleep).await;
                        break false;
                    }
                },
            }
        };

        if !sender_gone {
            self.shutdown = Some(rx);
        }
        requested
    }

    /// Enter Terminating and release the sensor.
    fn terminate(&mut self) -> LoopState {
        self.phase = MonitorPhase::Terminating;
        if self.shutdown_requested() {
            info!("Shutting down");
        }
        self.release();
        self.state.clone()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.reader.release();
            debug!("Sensor released");
        }
    }
}

fn blocking<R>(read: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(read)
        }
        _ => read(),
    }
}

impl<D: SensorDriver> Drop for MonitorLoop<D> {
    fn drop(&mut self) {
        self.release();
    }
}
