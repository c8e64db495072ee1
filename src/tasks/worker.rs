//! Background execution context
//!
//! A dedicated OS thread with its own single-threaded runtime runs an
//! independent [`CountdownMachine`] anchored to its own clock reads. It only
//! ever sees JSON commands arriving on a channel and answers with JSON
//! messages on another.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::{
    runtime::Builder,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{interval, sleep, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    driver::TimerOptions,
    protocol::{WorkerCommand, WorkerMessage, WorkerStatus},
};
use crate::{
    services::NotificationRequest,
    state::{CountdownMachine, TimerEvent, TimerState},
};

/// The background context could not be created
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to spawn worker thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("worker thread exited during initialization")]
    Terminated,
}

/// Caller-side ends of the worker's message channels
pub struct WorkerChannels {
    pub commands: UnboundedSender<String>,
    pub messages: UnboundedReceiver<String>,
}

/// Creates the background execution context for a driver
pub type WorkerSpawner = fn(&TimerOptions) -> Result<WorkerChannels, DriverError>;

/// Create the worker thread. It exits once the command sender is dropped.
///
/// Blocks only until the thread has built its runtime, so initialization
/// failures surface here instead of as a worker that never becomes ready.
pub fn spawn_worker(options: &TimerOptions) -> Result<WorkerChannels, DriverError> {
    let (command_tx, command_rx) = mpsc::unbounded_channel::<String>();
    let (message_tx, message_rx) = mpsc::unbounded_channel::<String>();
    let (init_tx, init_rx) = std::sync::mpsc::sync_channel::<Result<(), std::io::Error>>(1);
    let poll_interval = options.poll_interval;
    let ready_delay = options.worker_ready_delay;

    std::thread::Builder::new()
        .name("timer-worker".to_string())
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));
            runtime.block_on(run_worker(command_rx, message_tx, poll_interval, ready_delay));
        })
        .map_err(DriverError::Thread)?;

    match init_rx.recv() {
        Ok(Ok(())) => Ok(WorkerChannels {
            commands: command_tx,
            messages: message_rx,
        }),
        Ok(Err(e)) => Err(DriverError::Runtime(e)),
        Err(_) => Err(DriverError::Terminated),
    }
}

async fn run_worker(
    mut commands: UnboundedReceiver<String>,
    outbox: UnboundedSender<String>,
    poll_interval: Duration,
    ready_delay: Duration,
) {
    let mut worker = TimerWorker {
        machine: CountdownMachine::default(),
        session_id: 0,
        outbox,
    };

    if !ready_delay.is_zero() {
        sleep(ready_delay).await;
    }
    worker.post(WorkerMessage::WorkerReady { initialized: true });
    info!("Timer worker ready");

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(raw) => worker.handle(&raw),
                None => break,
            },
            _ = ticker.tick(), if worker.machine.is_running() => worker.tick(),
        }
    }

    info!("Timer worker terminated");
}

struct TimerWorker {
    machine: CountdownMachine,
    session_id: u64,
    outbox: UnboundedSender<String>,
}

impl TimerWorker {
    fn handle(&mut self, raw: &str) {
        let command = match WorkerCommand::from_json(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!("Unknown command received by timer worker: {} ({})", raw, e);
                return;
            }
        };
        debug!("Worker received {}", command.name());

        let now = Instant::now();
        let outcome = match command {
            WorkerCommand::Start { duration_seconds, session_id } => {
                self.session_id = session_id;
                self.machine.set_duration(clamp_seconds(duration_seconds));
                self.machine.start(now)
            }
            WorkerCommand::Pause => self.machine.pause(now),
            WorkerCommand::Resume => self.machine.resume(now),
            WorkerCommand::Stop => self.machine.stop(now),
            WorkerCommand::SetDuration { duration_seconds, session_id } => {
                self.session_id = session_id;
                Ok(self.machine.set_duration(clamp_seconds(duration_seconds)))
            }
            WorkerCommand::QueryStatus => Ok(TimerEvent::Tick),
        };

        match outcome {
            Ok(TimerEvent::Complete) => {
                self.post(WorkerMessage::TimerStatus(self.status()));
                self.complete();
            }
            Ok(_) => self.post(WorkerMessage::TimerStatus(self.status())),
            Err(e) => {
                debug!("Worker ignoring command: {}", e);
                self.post(WorkerMessage::TimerStatus(self.status()));
            }
        }
    }

    fn tick(&mut self) {
        let event = self.machine.tick(Instant::now());
        self.post(WorkerMessage::TimerTick(self.status()));

        if event == Some(TimerEvent::Complete) {
            self.complete();
        }
    }

    fn complete(&mut self) {
        info!("Worker countdown completed for session {}", self.session_id);
        self.post(WorkerMessage::TimerCompleted {
            completed_at: Utc::now(),
            session_id: self.session_id,
        });
        self.post(WorkerMessage::RequestCompletionNotification(
            NotificationRequest::timer_completed(),
        ));
    }

    fn status(&self) -> WorkerStatus {
        let snapshot = self.machine.snapshot();
        WorkerStatus {
            remaining_seconds: snapshot.remaining_seconds,
            remaining_milliseconds: snapshot.remaining_milliseconds,
            is_running: snapshot.state == TimerState::Running,
            is_complete: snapshot.state == TimerState::Completed,
            session_id: self.session_id,
        }
    }

    fn post(&self, message: WorkerMessage) {
        match message.to_json() {
            Ok(raw) => {
                if self.outbox.send(raw).is_err() {
                    debug!("Background driver gone, dropping worker message");
                }
            }
            Err(e) => warn!("Failed to encode worker message: {}", e),
        }
    }
}

fn clamp_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}
