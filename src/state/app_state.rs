//! Main application state shared by the HTTP handlers

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{Subscription, SessionTracker};
use crate::tasks::FocusTimer;

/// The timer plus server metadata
pub struct AppState {
    /// The one timer this server controls
    pub timer: FocusTimer,
    /// Turns timer updates into session records
    pub tracker: Arc<SessionTracker>,
    tracker_subscription: Mutex<Option<Subscription>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    /// Wire the session tracker to the timer's update stream
    pub fn new(timer: FocusTimer, tracker: Arc<SessionTracker>, port: u16, host: String) -> Self {
        let observer = Arc::clone(&tracker);
        let subscription = timer.subscribe(move |update| observer.observe(update));

        Self {
            timer,
            tracker,
            tracker_subscription: Mutex::new(Some(subscription)),
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Remember the most recent command issued through the API
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Record any session still in flight and release the timer
    pub fn shutdown(&self) {
        if let Some(subscription) = self.tracker_subscription.lock().ok().and_then(|mut s| s.take()) {
            subscription.unsubscribe();
        }
        self.tracker.interrupt();
        self.timer.shutdown();
        info!("Timer state released");
    }
}
