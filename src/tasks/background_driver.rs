//! Countdown driver backed by the background worker
//!
//! The caller's view of the countdown is a mirror: lifecycle transitions are
//! applied locally as soon as a command is issued, and the worker's status
//! pushes only ever move the remaining time downwards while running. Pushes
//! carry the session they belong to, so anything from a superseded session
//! is dropped.

use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::{
    driver::{TimerDriver, TimerOptions},
    protocol::{WorkerCommand, WorkerMessage, WorkerStatus},
    worker::{spawn_worker, DriverError, WorkerChannels},
};
use crate::{
    services::{CompletionNotifier, DriverKind, NotificationRequest},
    state::{
        timer_state::ceil_seconds, TimerEvent, TimerSnapshot, TimerState, UpdateSender,
        MAX_DURATION_SECONDS,
    },
};

struct BackgroundInner {
    state: TimerState,
    planned_seconds: u64,
    remaining_ms: u64,
    displayed_seconds: u64,
    session_id: u64,
    ready: bool,
    alive: bool,
    pending: VecDeque<WorkerCommand>,
    outbox: Option<UnboundedSender<String>>,
    updates: UpdateSender,
}

impl BackgroundInner {
    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::new(self.state, self.planned_seconds, self.remaining_ms)
    }

    fn emit(&self, event: TimerEvent) {
        self.updates.emit(self.snapshot(), event);
    }

    fn load_duration(&mut self, seconds: u64) {
        let seconds = seconds.min(MAX_DURATION_SECONDS);
        self.state = TimerState::Idle;
        self.planned_seconds = seconds;
        self.remaining_ms = seconds.saturating_mul(1000);
        self.displayed_seconds = seconds;
    }

    /// Send now, or queue until the worker has announced readiness
    fn send(&mut self, command: WorkerCommand) {
        if !self.ready {
            debug!("Worker not ready, queueing {}", command.name());
            self.pending.push_back(command);
            return;
        }
        self.post(&command);
    }

    fn post(&self, command: &WorkerCommand) {
        let Some(outbox) = &self.outbox else {
            return;
        };
        match command.to_json() {
            Ok(raw) => {
                if outbox.send(raw).is_err() {
                    warn!("Timer worker is gone, dropped {}", command.name());
                }
            }
            Err(e) => warn!("Failed to encode {}: {}", command.name(), e),
        }
    }

    fn flush_pending(&mut self) {
        let queued: Vec<WorkerCommand> = self.pending.drain(..).collect();
        if !queued.is_empty() {
            info!("Timer worker ready, flushing {} queued commands", queued.len());
        }
        for command in &queued {
            self.post(command);
        }
    }

    fn stop_session(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        if self.state == TimerState::Running && self.remaining_ms == 0 {
            self.finish();
            return true;
        }
        self.state = TimerState::Stopped;
        self.emit(TimerEvent::Stop);
        self.send(WorkerCommand::Stop);
        true
    }

    /// Mark the current session completed. Later completion pushes are ignored.
    fn finish(&mut self) {
        self.state = TimerState::Completed;
        self.remaining_ms = 0;
        self.displayed_seconds = 0;
        self.emit(TimerEvent::Complete);
    }

    fn new_duration(&mut self, seconds: u64) {
        self.session_id += 1;
        self.load_duration(seconds);
        self.emit(TimerEvent::Reset);
        self.send(WorkerCommand::SetDuration {
            duration_seconds: self.planned_seconds,
            session_id: self.session_id,
        });
    }

    /// Apply one worker push. Returns a notification to forward, if any.
    fn receive(&mut self, message: WorkerMessage) -> Option<NotificationRequest> {
        match message {
            WorkerMessage::WorkerReady { .. } => {
                self.ready = true;
                self.flush_pending();
            }
            WorkerMessage::TimerTick(status) | WorkerMessage::TimerStatus(status) => {
                self.apply_status(&status);
            }
            WorkerMessage::TimerCompleted { completed_at, session_id } => {
                if session_id != self.session_id || !self.state.is_active() {
                    debug!("Ignoring completion from session {}", session_id);
                    return None;
                }
                info!("Background countdown completed at {}", completed_at);
                self.finish();
            }
            WorkerMessage::RequestCompletionNotification(request) => return Some(request),
        }
        None
    }

    fn apply_status(&mut self, status: &WorkerStatus) {
        if status.session_id != self.session_id {
            debug!(
                "Ignoring status from session {} (current {})",
                status.session_id, self.session_id
            );
            return;
        }
        // frozen unless running; a push may predate the latest command
        if self.state != TimerState::Running {
            return;
        }

        self.remaining_ms = self.remaining_ms.min(status.remaining_milliseconds);
        if status.is_complete || self.remaining_ms == 0 {
            info!("Background countdown reached zero for session {}", self.session_id);
            self.finish();
            return;
        }

        let shown = ceil_seconds(self.remaining_ms);
        if shown != self.displayed_seconds {
            self.displayed_seconds = shown;
            self.emit(TimerEvent::Tick);
        }
    }
}

/// Runs the countdown inside an isolated worker thread
pub struct BackgroundDriver {
    inner: Arc<Mutex<BackgroundInner>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundDriver {
    /// Create the worker and start listening to it
    ///
    /// Must be called from within a tokio runtime. Commands issued before the
    /// worker reports readiness are queued and replayed in order.
    pub fn spawn(
        initial_seconds: u64,
        options: &TimerOptions,
        updates: UpdateSender,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Result<Self, DriverError> {
        let channels = spawn_worker(options)?;
        Ok(Self::with_channels(initial_seconds, channels, updates, notifier))
    }

    /// Attach to an already created worker
    pub fn with_channels(
        initial_seconds: u64,
        channels: WorkerChannels,
        updates: UpdateSender,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let mut inner = BackgroundInner {
            state: TimerState::Idle,
            planned_seconds: 0,
            remaining_ms: 0,
            displayed_seconds: 0,
            session_id: 1,
            ready: false,
            alive: true,
            pending: VecDeque::new(),
            outbox: Some(channels.commands),
            updates,
        };
        inner.load_duration(initial_seconds);
        inner.send(WorkerCommand::SetDuration {
            duration_seconds: inner.planned_seconds,
            session_id: inner.session_id,
        });

        let inner = Arc::new(Mutex::new(inner));
        let pump = Handle::current().spawn(pump_messages(
            Arc::downgrade(&inner),
            channels.messages,
            notifier,
        ));

        Self {
            inner,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Whether the worker has announced readiness
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Commands waiting for the worker to become ready
    pub fn pending_commands(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, BackgroundInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the mirror only while the driver is alive
    fn live(&self) -> Option<MutexGuard<'_, BackgroundInner>> {
        let inner = self.lock();
        if inner.alive {
            Some(inner)
        } else {
            debug!("Background driver shut down, ignoring command");
            None
        }
    }
}

async fn pump_messages(
    state: Weak<Mutex<BackgroundInner>>,
    mut messages: UnboundedReceiver<String>,
    notifier: Arc<dyn CompletionNotifier>,
) {
    while let Some(raw) = messages.recv().await {
        let message = match WorkerMessage::from_json(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed worker message: {} ({})", raw, e);
                continue;
            }
        };

        let Some(state) = state.upgrade() else {
            return;
        };
        let notification = {
            let mut inner = state.lock().unwrap_or_else(PoisonError::into_inner);
            if !inner.alive {
                return;
            }
            inner.receive(message)
        };

        if let Some(request) = notification {
            if catch_unwind(AssertUnwindSafe(|| notifier.notify(&request))).is_err() {
                error!("Completion notifier panicked");
            }
        }
    }
    warn!("Timer worker channel closed");
}

impl TimerDriver for BackgroundDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Background
    }

    fn set_duration_seconds(&self, seconds: i64) {
        if let Some(mut inner) = self.live() {
            let seconds = (seconds.max(0) as u64).min(MAX_DURATION_SECONDS);
            info!("Timer duration set to {}s", seconds);
            inner.new_duration(seconds);
        }
    }

    fn start(&self) {
        let Some(mut inner) = self.live() else {
            return;
        };
        if !matches!(inner.state, TimerState::Idle | TimerState::Stopped) {
            debug!("Ignoring start while {}", inner.state);
            return;
        }

        inner.session_id += 1;
        inner.state = TimerState::Running;
        inner.emit(TimerEvent::Start);
        let command = WorkerCommand::Start {
            duration_seconds: ceil_seconds(inner.remaining_ms),
            session_id: inner.session_id,
        };
        info!("Background timer started with {}ms remaining", inner.remaining_ms);
        inner.send(command);
    }

    fn pause(&self) {
        let Some(mut inner) = self.live() else {
            return;
        };
        if inner.state != TimerState::Running {
            debug!("Ignoring pause while {}", inner.state);
            return;
        }
        if inner.remaining_ms == 0 {
            inner.finish();
            return;
        }

        inner.state = TimerState::Paused;
        inner.emit(TimerEvent::Pause);
        inner.send(WorkerCommand::Pause);
    }

    fn resume(&self) {
        let Some(mut inner) = self.live() else {
            return;
        };
        if inner.state != TimerState::Paused {
            debug!("Ignoring resume while {}", inner.state);
            return;
        }

        inner.state = TimerState::Running;
        inner.emit(TimerEvent::Resume);
        inner.send(WorkerCommand::Resume);
    }

    fn stop(&self) {
        if let Some(mut inner) = self.live() {
            if !inner.stop_session() {
                debug!("Ignoring stop while {}", inner.state);
            }
        }
    }

    fn reset(&self) {
        if let Some(mut inner) = self.live() {
            inner.stop_session();
            let planned = inner.planned_seconds;
            info!("Timer reset to {}s", planned);
            inner.new_duration(planned);
        }
    }

    fn refresh(&self) {
        if let Some(mut inner) = self.live() {
            inner.send(WorkerCommand::QueryStatus);
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        self.lock().snapshot()
    }

    fn shutdown(&self) {
        {
            let mut inner = self.lock();
            if !inner.alive {
                return;
            }
            inner.alive = false;
            inner.pending.clear();
            // dropping the sender terminates the worker thread
            inner.outbox = None;
        }

        if let Some(pump) = self.pump.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pump.abort();
        }
        debug!("Background driver shut down");
    }
}

impl Drop for BackgroundDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
