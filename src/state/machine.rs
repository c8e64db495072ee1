//! Countdown state machine
//!
//! Pure transition logic shared by every execution context that runs a
//! countdown. Time is never read here: callers pass the current instant into
//! each command, so the same machine runs under the local driver, inside the
//! background worker, and in tests with synthetic instants.

use thiserror::Error;
use tokio::time::Instant;

use super::timer_state::{
    ceil_seconds, TimerEvent, TimerSnapshot, TimerState, MAX_DURATION_SECONDS,
};

/// A command that is not valid in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {command} a timer that is {state}")]
pub struct TransitionError {
    pub command: &'static str,
    pub state: TimerState,
}

impl TransitionError {
    fn new(command: &'static str, state: TimerState) -> Self {
        Self { command, state }
    }
}

/// Wall-clock anchored countdown
///
/// Effective elapsed time while running is
/// `carried + (now - anchor) - accumulated_pause`, where `carried` is the
/// elapsed time already consumed when the anchor was set. Remaining time is
/// recomputed from that on every tick instead of being decremented, so
/// irregular callback timing never accumulates drift.
#[derive(Debug, Clone)]
pub struct CountdownMachine {
    state: TimerState,
    planned_seconds: u64,
    remaining_ms: u64,
    /// Last whole-second value reported through a tick
    displayed_seconds: u64,
    start_anchor: Option<Instant>,
    carried_elapsed_ms: u64,
    accumulated_pause_ms: u64,
    paused_at: Option<Instant>,
}

impl CountdownMachine {
    pub fn new(seconds: u64) -> Self {
        let mut machine = Self {
            state: TimerState::Idle,
            planned_seconds: 0,
            remaining_ms: 0,
            displayed_seconds: 0,
            start_anchor: None,
            carried_elapsed_ms: 0,
            accumulated_pause_ms: 0,
            paused_at: None,
        };
        machine.load_duration(seconds);
        machine
    }

    /// Configure a fresh session. Allowed in any state.
    ///
    /// Negative input clamps to zero and anything past
    /// [`MAX_DURATION_SECONDS`] clamps to that ceiling.
    pub fn set_duration(&mut self, seconds: i64) -> TimerEvent {
        self.load_duration(seconds.max(0) as u64);
        TimerEvent::Reset
    }

    /// Begin counting down from the current remaining time
    pub fn start(&mut self, now: Instant) -> Result<TimerEvent, TransitionError> {
        match self.state {
            TimerState::Idle | TimerState::Stopped => {
                self.anchor(now);
                Ok(TimerEvent::Start)
            }
            other => Err(TransitionError::new("start", other)),
        }
    }

    /// Freeze the countdown at its current value
    pub fn pause(&mut self, now: Instant) -> Result<TimerEvent, TransitionError> {
        if self.state != TimerState::Running {
            return Err(TransitionError::new("pause", self.state));
        }

        if self.advance(now) {
            return Ok(self.finish());
        }
        self.paused_at = Some(now);
        self.state = TimerState::Paused;
        Ok(TimerEvent::Pause)
    }

    /// Continue after a pause, excluding the paused interval from elapsed time
    pub fn resume(&mut self, now: Instant) -> Result<TimerEvent, TransitionError> {
        if self.state != TimerState::Paused {
            return Err(TransitionError::new("resume", self.state));
        }

        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = now.saturating_duration_since(paused_at).as_millis() as u64;
            self.accumulated_pause_ms = self.accumulated_pause_ms.saturating_add(paused_for);
        }
        self.state = TimerState::Running;
        Ok(TimerEvent::Resume)
    }

    /// End the session early. Remaining time is kept as-is.
    pub fn stop(&mut self, now: Instant) -> Result<TimerEvent, TransitionError> {
        match self.state {
            TimerState::Running => {
                if self.advance(now) {
                    return Ok(self.finish());
                }
            }
            TimerState::Paused => {}
            other => return Err(TransitionError::new("stop", other)),
        }

        self.state = TimerState::Stopped;
        self.clear_anchor();
        Ok(TimerEvent::Stop)
    }

    /// Back to idle with the planned duration restored
    pub fn reset(&mut self) -> TimerEvent {
        self.load_duration(self.planned_seconds);
        TimerEvent::Reset
    }

    /// Periodic re-evaluation while running
    ///
    /// Returns `Tick` only when the displayed second changed, and `Complete`
    /// exactly once when the remaining time reaches zero.
    pub fn tick(&mut self, now: Instant) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }

        if self.advance(now) {
            return Some(self.finish());
        }

        let shown = ceil_seconds(self.remaining_ms);
        if shown != self.displayed_seconds {
            self.displayed_seconds = shown;
            Some(TimerEvent::Tick)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::new(self.state, self.planned_seconds, self.remaining_ms)
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn planned_seconds(&self) -> u64 {
        self.planned_seconds
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn accumulated_pause_ms(&self) -> u64 {
        self.accumulated_pause_ms
    }

    fn load_duration(&mut self, seconds: u64) {
        let seconds = seconds.min(MAX_DURATION_SECONDS);
        self.state = TimerState::Idle;
        self.planned_seconds = seconds;
        self.remaining_ms = seconds.saturating_mul(1000);
        self.displayed_seconds = seconds;
        self.carried_elapsed_ms = 0;
        self.clear_anchor();
    }

    fn anchor(&mut self, now: Instant) {
        self.carried_elapsed_ms = self.planned_ms() - self.remaining_ms;
        self.start_anchor = Some(now);
        self.accumulated_pause_ms = 0;
        self.paused_at = None;
        self.state = TimerState::Running;
    }

    fn clear_anchor(&mut self) {
        self.start_anchor = None;
        self.accumulated_pause_ms = 0;
        self.paused_at = None;
    }

    /// Recompute remaining time from the anchor. Returns true once it hits zero.
    fn advance(&mut self, now: Instant) -> bool {
        let Some(anchor) = self.start_anchor else {
            return self.remaining_ms == 0;
        };

        let since_anchor = now.saturating_duration_since(anchor).as_millis() as u64;
        let elapsed = self
            .carried_elapsed_ms
            .saturating_add(since_anchor.saturating_sub(self.accumulated_pause_ms));

        // never let a clock step move the countdown backwards
        let remaining = self.planned_ms().saturating_sub(elapsed);
        self.remaining_ms = self.remaining_ms.min(remaining);
        self.remaining_ms == 0
    }

    fn finish(&mut self) -> TimerEvent {
        self.state = TimerState::Completed;
        self.remaining_ms = 0;
        self.displayed_seconds = 0;
        self.clear_anchor();
        TimerEvent::Complete
    }

    fn planned_ms(&self) -> u64 {
        self.planned_seconds.saturating_mul(1000)
    }
}

impl Default for CountdownMachine {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_set_duration_clamps_negative_input() {
        let mut machine = CountdownMachine::new(30);
        assert_eq!(machine.set_duration(-5), TimerEvent::Reset);
        assert_eq!(machine.planned_seconds(), 0);
        assert_eq!(machine.snapshot().remaining_seconds, 0);
        assert_eq!(machine.state(), TimerState::Idle);
    }

    #[test]
    fn test_huge_duration_clamps_to_ceiling() {
        let mut machine = CountdownMachine::new(0);
        machine.set_duration(i64::MAX);

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.planned_duration_seconds, MAX_DURATION_SECONDS);
        assert_eq!(snapshot.remaining_seconds, snapshot.planned_duration_seconds);
        assert_eq!(snapshot.progress_fraction, 0.0);

        let t0 = Instant::now();
        machine.start(t0).unwrap();
        assert_eq!(machine.tick(t0 + ms(1000)), Some(TimerEvent::Tick));
        assert_eq!(machine.snapshot().remaining_seconds, MAX_DURATION_SECONDS - 1);
    }

    #[test]
    fn test_tick_only_reports_changed_seconds() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(10);
        assert_eq!(machine.start(t0), Ok(TimerEvent::Start));

        assert_eq!(machine.tick(t0 + ms(100)), None);
        assert_eq!(machine.tick(t0 + ms(900)), None);
        assert_eq!(machine.tick(t0 + ms(1000)), Some(TimerEvent::Tick));
        assert_eq!(machine.snapshot().remaining_seconds, 9);
        assert_eq!(machine.tick(t0 + ms(1100)), None);
    }

    #[test]
    fn test_completion_is_emitted_once() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(3);
        machine.start(t0).unwrap();

        assert_eq!(machine.tick(t0 + ms(2999)), Some(TimerEvent::Tick));
        assert_eq!(machine.snapshot().remaining_seconds, 1);
        assert_eq!(machine.tick(t0 + ms(3000)), Some(TimerEvent::Complete));
        assert_eq!(machine.tick(t0 + ms(3100)), None);
        assert_eq!(machine.tick(t0 + ms(9000)), None);

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, TimerState::Completed);
        assert_eq!(snapshot.remaining_seconds, 0);
        assert_eq!(snapshot.progress_fraction, 1.0);
    }

    #[test]
    fn test_pause_time_is_excluded() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(60);
        machine.start(t0).unwrap();
        machine.pause(t0 + ms(5_000)).unwrap();

        // frozen while paused
        assert_eq!(machine.tick(t0 + ms(20_000)), None);
        assert_eq!(machine.snapshot().remaining_seconds, 55);

        machine.resume(t0 + ms(35_000)).unwrap();
        assert_eq!(machine.accumulated_pause_ms(), 30_000);

        machine.tick(t0 + ms(38_000));
        assert_eq!(machine.snapshot().remaining_seconds, 52);
    }

    #[test]
    fn test_immediate_pause_resume_keeps_full_duration() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(30);
        machine.start(t0).unwrap();
        machine.pause(t0).unwrap();
        machine.resume(t0).unwrap();

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, TimerState::Running);
        assert_eq!(snapshot.remaining_seconds, 30);
    }

    #[test]
    fn test_invalid_commands_are_rejected_without_side_effects() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(10);
        let before = machine.snapshot();

        assert_eq!(
            machine.pause(t0),
            Err(TransitionError { command: "pause", state: TimerState::Idle })
        );
        assert!(machine.resume(t0).is_err());
        assert!(machine.stop(t0).is_err());
        assert_eq!(machine.snapshot(), before);

        machine.start(t0).unwrap();
        assert!(machine.start(t0 + ms(10)).is_err());
        assert!(machine.resume(t0 + ms(10)).is_err());
    }

    #[test]
    fn test_stop_keeps_remaining_and_reset_restores() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(45);
        machine.start(t0).unwrap();
        assert_eq!(machine.stop(t0 + ms(4_000)), Ok(TimerEvent::Stop));

        let stopped = machine.snapshot();
        assert_eq!(stopped.state, TimerState::Stopped);
        assert_eq!(stopped.remaining_seconds, 41);

        assert_eq!(machine.reset(), TimerEvent::Reset);
        let reset = machine.snapshot();
        assert_eq!(reset.state, TimerState::Idle);
        assert_eq!(reset.remaining_seconds, 45);
        assert_eq!(reset.planned_duration_seconds, 45);
    }

    #[test]
    fn test_start_after_stop_continues_without_double_counting_pauses() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(100);
        machine.start(t0).unwrap();
        machine.pause(t0 + ms(10_000)).unwrap();
        machine.resume(t0 + ms(20_000)).unwrap();
        machine.stop(t0 + ms(30_000)).unwrap();
        assert_eq!(machine.snapshot().remaining_seconds, 80);

        machine.start(t0 + ms(50_000)).unwrap();
        machine.tick(t0 + ms(55_000));
        assert_eq!(machine.snapshot().remaining_seconds, 75);
    }

    #[test]
    fn test_completed_timer_needs_fresh_duration() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(1);
        machine.start(t0).unwrap();
        machine.tick(t0 + ms(1_000));

        assert!(machine.start(t0 + ms(1_100)).is_err());
        machine.set_duration(2);
        assert_eq!(machine.start(t0 + ms(1_200)), Ok(TimerEvent::Start));
    }

    #[test]
    fn test_pause_past_deadline_completes() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(2);
        machine.start(t0).unwrap();
        assert_eq!(machine.pause(t0 + ms(2_500)), Ok(TimerEvent::Complete));
        assert_eq!(machine.state(), TimerState::Completed);
    }

    #[test]
    fn test_remaining_is_monotonic_under_backward_clock() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(10);
        machine.start(t0).unwrap();
        machine.tick(t0 + ms(4_000));
        assert_eq!(machine.snapshot().remaining_seconds, 6);

        // an earlier reading must not add time back
        machine.tick(t0 + ms(1_000));
        assert_eq!(machine.snapshot().remaining_seconds, 6);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let t0 = Instant::now();
        let mut machine = CountdownMachine::new(0);
        machine.start(t0).unwrap();
        assert_eq!(machine.tick(t0), Some(TimerEvent::Complete));
    }
}
