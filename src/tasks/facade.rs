//! Single public timer surface over the local and background drivers

use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    background_driver::BackgroundDriver,
    driver::{TimerDriver, TimerOptions},
    local_driver::LocalDriver,
    worker::{spawn_worker, WorkerSpawner},
};
use crate::{
    services::{
        select_driver, Capabilities, Clock, CompletionNotifier, DriverKind, DriverPreference,
        LogNotifier, TokioClock,
    },
    state::{spawn_dispatcher, Listeners, Subscription, TimerSnapshot, TimerUpdate},
};

/// Construction parameters for a [`FocusTimer`]
pub struct FocusTimerBuilder {
    initial_seconds: u64,
    preference: DriverPreference,
    capabilities: Capabilities,
    options: TimerOptions,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn CompletionNotifier>,
    worker: WorkerSpawner,
}

impl FocusTimerBuilder {
    pub fn new(initial_seconds: u64) -> Self {
        Self {
            initial_seconds,
            preference: DriverPreference::Auto,
            capabilities: Capabilities::detect(false, false),
            options: TimerOptions::default(),
            clock: Arc::new(TokioClock),
            notifier: Arc::new(LogNotifier),
            worker: spawn_worker,
        }
    }

    pub fn preference(mut self, preference: DriverPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn options(mut self, options: TimerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace how the background worker is created
    pub fn worker(mut self, worker: WorkerSpawner) -> Self {
        self.worker = worker;
        self
    }

    /// Pick and create the driver. Must be called from within a tokio runtime.
    pub fn build(self) -> FocusTimer {
        let listeners = Listeners::new();
        let (updates, dispatcher) = spawn_dispatcher(listeners.clone());

        let wanted = select_driver(self.preference, &self.capabilities);
        let driver: Box<dyn TimerDriver> = match wanted {
            DriverKind::Background => match (self.worker)(&self.options) {
                Ok(channels) => Box::new(BackgroundDriver::with_channels(
                    self.initial_seconds,
                    channels,
                    updates,
                    Arc::clone(&self.notifier),
                )),
                Err(e) => {
                    warn!("Background timer unavailable, falling back to local driver: {}", e);
                    Box::new(LocalDriver::new(
                        self.initial_seconds,
                        &self.options,
                        Arc::clone(&self.clock),
                        updates,
                    ))
                }
            },
            DriverKind::Local => Box::new(LocalDriver::new(
                self.initial_seconds,
                &self.options,
                Arc::clone(&self.clock),
                updates,
            )),
        };
        info!("Focus timer using {:?} driver", driver.kind());

        FocusTimer {
            driver,
            listeners,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }
}

/// The timer callers interact with
///
/// The driver is chosen once at construction and owned exclusively for the
/// facade's lifetime. Every command is a synchronous no-fail call; updates
/// arrive in order through [`FocusTimer::subscribe`].
pub struct FocusTimer {
    driver: Box<dyn TimerDriver>,
    listeners: Listeners,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl FocusTimer {
    /// Local or background driver chosen from the detected capabilities
    pub fn new(initial_seconds: u64) -> Self {
        FocusTimerBuilder::new(initial_seconds).build()
    }

    pub fn builder(initial_seconds: u64) -> FocusTimerBuilder {
        FocusTimerBuilder::new(initial_seconds)
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    /// Configure a fresh session; negative values clamp to zero
    pub fn set_duration_seconds(&self, seconds: i64) {
        self.driver.set_duration_seconds(seconds);
    }

    pub fn set_duration_minutes(&self, minutes: i64) {
        self.driver.set_duration_seconds(minutes.saturating_mul(60));
    }

    pub fn start(&self) {
        self.driver.start();
    }

    pub fn pause(&self) {
        self.driver.pause();
    }

    pub fn resume(&self) {
        self.driver.resume();
    }

    pub fn stop(&self) {
        self.driver.stop();
    }

    pub fn reset(&self) {
        self.driver.reset();
    }

    /// Resynchronize with the background worker, if one is in use
    pub fn refresh(&self) {
        self.driver.refresh();
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.driver.snapshot()
    }

    /// Receive every snapshot together with the event that produced it
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TimerUpdate) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Release the driver's periodic work and drop every subscription
    pub fn shutdown(&self) {
        self.driver.shutdown();
        self.listeners.clear();
        if let Some(dispatcher) = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            dispatcher.abort();
            debug!("Focus timer shut down");
        }
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{TimerEvent, TimerState},
        tasks::worker::DriverError,
    };
    use std::time::Duration;
    use tokio::time::sleep;

    fn recorder(timer: &FocusTimer) -> Arc<Mutex<Vec<TimerUpdate>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = timer.subscribe(move |update| sink.lock().unwrap().push(update.clone()));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_defaults_to_local_driver() {
        let timer = FocusTimer::new(1500);
        assert_eq!(timer.driver_kind(), DriverKind::Local);
        assert_eq!(timer.snapshot().remaining_seconds, 1500);
        assert_eq!(timer.snapshot().state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_reset() {
        let timer = FocusTimer::new(0);
        timer.set_duration_seconds(90);
        timer.reset();

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.remaining_seconds, 90);
        assert_eq!(snapshot.planned_duration_seconds, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn test_minutes_convenience() {
        let timer = FocusTimer::new(0);
        timer.set_duration_minutes(25);
        assert_eq!(timer.snapshot().planned_duration_seconds, 1500);
        timer.set_duration_minutes(-3);
        assert_eq!(timer.snapshot().planned_duration_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery() {
        let timer = FocusTimer::new(10);
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let subscription = timer.subscribe(move |_| *counter.lock().unwrap() += 1);

        timer.start();
        sleep(Duration::from_millis(1_050)).await;
        let delivered = *seen.lock().unwrap();
        assert_eq!(delivered, 2);

        subscription.unsubscribe();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(*seen.lock().unwrap(), delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_listeners_and_stops_ticks() {
        let timer = FocusTimer::new(10);
        let seen = recorder(&timer);
        timer.start();
        sleep(Duration::from_millis(1_500)).await;
        timer.shutdown();
        let count = seen.lock().unwrap().len();

        timer.start();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
        assert_eq!(seen.lock().unwrap()[0].event, TimerEvent::Start);
    }

    #[tokio::test]
    async fn test_background_preference_uses_worker() {
        let timer = FocusTimer::builder(1)
            .preference(DriverPreference::Background)
            .build();
        assert_eq!(timer.driver_kind(), DriverKind::Background);

        let seen = recorder(&timer);
        timer.start();
        sleep(Duration::from_millis(1_800)).await;

        let events: Vec<TimerEvent> = seen.lock().unwrap().iter().map(|u| u.event).collect();
        assert_eq!(events.first(), Some(&TimerEvent::Start));
        assert_eq!(events.last(), Some(&TimerEvent::Complete));
        assert_eq!(events.iter().filter(|e| **e == TimerEvent::Complete).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_failure_falls_back_to_local() {
        let timer = FocusTimer::builder(10)
            .preference(DriverPreference::Background)
            .worker(|_| Err(DriverError::Terminated))
            .build();
        assert_eq!(timer.driver_kind(), DriverKind::Local);

        let seen = recorder(&timer);
        timer.start();
        sleep(Duration::from_millis(1_050)).await;

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.state, TimerState::Running);
        assert_eq!(snapshot.remaining_seconds, 9);
        let events: Vec<TimerEvent> = seen.lock().unwrap().iter().map(|u| u.event).collect();
        assert_eq!(events, vec![TimerEvent::Start, TimerEvent::Tick]);
    }

    #[tokio::test]
    async fn test_unsupported_background_falls_back_to_local() {
        let capabilities = Capabilities {
            installed_app: true,
            constrained_platform: true,
            background_execution: false,
        };
        let timer = FocusTimer::builder(5).capabilities(capabilities).build();
        assert_eq!(timer.driver_kind(), DriverKind::Local);
    }
}
