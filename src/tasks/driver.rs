//! Common driver contract

use std::time::Duration;

use crate::{services::DriverKind, state::TimerSnapshot};

/// Default re-evaluation period while a countdown runs
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning shared by both drivers
#[derive(Debug, Clone)]
pub struct TimerOptions {
    /// How often a running countdown is recomputed from the wall clock
    pub poll_interval: Duration,
    /// Extra delay before the background worker announces readiness
    pub worker_ready_delay: Duration,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            worker_ready_delay: Duration::ZERO,
        }
    }
}

/// A concrete strategy that runs a countdown
///
/// Commands never fail. Anything invalid for the current state is ignored,
/// and updates are delivered asynchronously through the facade's listeners.
pub trait TimerDriver: Send + Sync {
    fn kind(&self) -> DriverKind;

    fn set_duration_seconds(&self, seconds: i64);

    fn start(&self);

    fn pause(&self);

    fn resume(&self);

    fn stop(&self);

    fn reset(&self);

    /// Ask the driver to resynchronize its view of the countdown
    fn refresh(&self) {}

    fn snapshot(&self) -> TimerSnapshot;

    /// Release periodic work and any execution context. Later commands are ignored.
    fn shutdown(&self);
}
