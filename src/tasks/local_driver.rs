//! In-process countdown driver

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

use super::driver::{TimerDriver, TimerOptions};
use crate::{
    services::{Clock, DriverKind},
    state::{CountdownMachine, TimerEvent, TimerSnapshot, TransitionError, UpdateSender},
};

struct LocalInner {
    machine: CountdownMachine,
    /// Bumped whenever the poll task is cancelled, so a task that already
    /// woke up sees it is stale before touching the machine
    generation: u64,
    alive: bool,
    poll: Option<JoinHandle<()>>,
}

impl LocalInner {
    fn cancel_poll(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
    }
}

/// Runs the countdown on the caller's runtime with a short polling interval
pub struct LocalDriver {
    inner: Arc<Mutex<LocalInner>>,
    clock: Arc<dyn Clock>,
    updates: UpdateSender,
    poll_interval: Duration,
    runtime: Handle,
}

impl LocalDriver {
    /// Create a driver. Must be called from within a tokio runtime.
    pub fn new(
        initial_seconds: u64,
        options: &TimerOptions,
        clock: Arc<dyn Clock>,
        updates: UpdateSender,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocalInner {
                machine: CountdownMachine::new(initial_seconds),
                generation: 0,
                alive: true,
                poll: None,
            })),
            clock,
            updates,
            poll_interval: options.poll_interval,
            runtime: Handle::current(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, inner: &LocalInner, event: TimerEvent) {
        self.updates.emit(inner.machine.snapshot(), event);
    }

    /// Apply a transition and emit its event; invalid commands are dropped
    fn apply<F>(&self, inner: &mut LocalInner, command: F) -> Option<TimerEvent>
    where
        F: FnOnce(&mut CountdownMachine) -> Result<TimerEvent, TransitionError>,
    {
        if !inner.alive {
            debug!("Local driver shut down, ignoring command");
            return None;
        }

        match command(&mut inner.machine) {
            Ok(event) => {
                self.emit(inner, event);
                Some(event)
            }
            Err(e) => {
                debug!("Ignoring timer command: {}", e);
                None
            }
        }
    }

    /// Replace any running poll task with a fresh one
    fn spawn_poll(&self, inner: &mut LocalInner) {
        inner.cancel_poll();

        let generation = inner.generation;
        let state = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.clock);
        let updates = self.updates.clone();
        let period = self.poll_interval;

        inner.poll = Some(self.runtime.spawn(async move {
            poll_countdown(state, generation, clock, updates, period).await;
        }));
    }
}

/// Periodic re-evaluation loop for one running stretch of a countdown
async fn poll_countdown(
    state: Weak<Mutex<LocalInner>>,
    generation: u64,
    clock: Arc<dyn Clock>,
    updates: UpdateSender,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick of an interval completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(state) = state.upgrade() else {
            break;
        };
        let mut inner = state.lock().unwrap_or_else(PoisonError::into_inner);
        if !inner.alive || inner.generation != generation {
            break;
        }

        match inner.machine.tick(clock.now()) {
            Some(TimerEvent::Complete) => {
                info!("Countdown completed");
                updates.emit(inner.machine.snapshot(), TimerEvent::Complete);
                inner.poll = None;
                break;
            }
            Some(event) => updates.emit(inner.machine.snapshot(), event),
            None => {}
        }
    }
}

impl TimerDriver for LocalDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Local
    }

    fn set_duration_seconds(&self, seconds: i64) {
        let mut inner = self.lock();
        if !inner.alive {
            return;
        }

        inner.cancel_poll();
        let event = inner.machine.set_duration(seconds);
        info!("Timer duration set to {}s", inner.machine.planned_seconds());
        self.emit(&inner, event);
    }

    fn start(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if self.apply(&mut inner, |m| m.start(now)).is_some() {
            info!("Timer started with {}ms remaining", inner.machine.remaining_ms());
            self.spawn_poll(&mut inner);
        }
    }

    fn pause(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if let Some(event) = self.apply(&mut inner, |m| m.pause(now)) {
            inner.cancel_poll();
            info!("Timer {:?} at {}ms remaining", event, inner.machine.remaining_ms());
        }
    }

    fn resume(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if self.apply(&mut inner, |m| m.resume(now)).is_some() {
            info!("Timer resumed with {}ms remaining", inner.machine.remaining_ms());
            self.spawn_poll(&mut inner);
        }
    }

    fn stop(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if let Some(event) = self.apply(&mut inner, |m| m.stop(now)) {
            inner.cancel_poll();
            info!("Timer {:?} at {}ms remaining", event, inner.machine.remaining_ms());
        }
    }

    fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if !inner.alive {
            return;
        }

        inner.cancel_poll();
        if let Ok(event) = inner.machine.stop(now) {
            self.emit(&inner, event);
        }
        let event = inner.machine.reset();
        info!("Timer reset to {}s", inner.machine.planned_seconds());
        self.emit(&inner, event);
    }

    fn snapshot(&self) -> TimerSnapshot {
        self.lock().machine.snapshot()
    }

    fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.alive {
            inner.alive = false;
            inner.cancel_poll();
            debug!("Local driver shut down");
        }
    }
}

impl Drop for LocalDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
