//! Timer state, lifecycle events and snapshots

use serde::{Deserialize, Serialize};

/// Countdown state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// No session started, remaining equals planned
    Idle,
    /// Countdown active, wall-clock anchor set
    Running,
    /// Countdown frozen, elapsed time preserved
    Paused,
    /// Ended by the user before reaching zero
    Stopped,
    /// Reached zero, terminal for the session
    Completed,
}

impl TimerState {
    /// Running or paused: a session is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, TimerState::Running | TimerState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Stopped => "stopped",
            TimerState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event accompanying every snapshot emission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerEvent {
    Tick,
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Complete,
}

impl TimerEvent {
    /// Anything other than a plain tick
    pub fn is_transition(&self) -> bool {
        !matches!(self, TimerEvent::Tick)
    }
}

/// Immutable view of the countdown, produced on every observable change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub planned_duration_seconds: u64,
    pub remaining_seconds: u64,
    pub remaining_milliseconds: u64,
    pub progress_fraction: f64,
}

impl TimerSnapshot {
    /// Build a snapshot, deriving the progress fraction
    pub fn new(state: TimerState, planned_duration_seconds: u64, remaining_milliseconds: u64) -> Self {
        let planned_ms = planned_duration_seconds.saturating_mul(1000);
        let remaining_milliseconds = remaining_milliseconds.min(planned_ms);
        let remaining_seconds = ceil_seconds(remaining_milliseconds);

        let progress_fraction = if planned_duration_seconds == 0 {
            0.0
        } else {
            (planned_duration_seconds - remaining_seconds) as f64 / planned_duration_seconds as f64
        };

        Self {
            state,
            planned_duration_seconds,
            remaining_seconds,
            remaining_milliseconds,
            progress_fraction,
        }
    }

    /// Seconds actually spent counting down
    pub fn elapsed_seconds(&self) -> u64 {
        self.planned_duration_seconds - self.remaining_seconds
    }

    /// Progress rounded to a whole percentage
    pub fn progress_percentage(&self) -> u8 {
        (self.progress_fraction * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Remaining time as `MM:SS`, or `HH:MM:SS` past the hour
    pub fn formatted(&self) -> String {
        let hours = self.remaining_seconds / 3600;
        let minutes = (self.remaining_seconds % 3600) / 60;
        let seconds = self.remaining_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }
}

/// Longest countdown that still fits in milliseconds
pub const MAX_DURATION_SECONDS: u64 = u64::MAX / 1000;

/// Whole seconds shown for a millisecond remainder. Zero only at exactly zero.
pub fn ceil_seconds(milliseconds: u64) -> u64 {
    milliseconds.div_ceil(1000)
}

/// A snapshot together with the event that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerUpdate {
    pub snapshot: TimerSnapshot,
    pub event: TimerEvent,
}
