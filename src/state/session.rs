//! Session records for the persistence collaborator
//!
//! The timer core never stores anything. This tracker sits on the caller's
//! side of a subscription and turns lifecycle events into one record per
//! session, handed to whatever [`SessionSink`] the application wires in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tracing::{debug, info};

use super::timer_state::{TimerEvent, TimerSnapshot, TimerUpdate};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Cancelled,
    Interrupted,
}

/// One finished focus session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub profile_id: String,
    pub profile_name: String,
    pub planned_duration_seconds: u64,
    pub actual_duration_seconds: u64,
    pub completion_status: CompletionStatus,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub interruption_count: u32,
}

/// Profile the sessions are attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub id: String,
    pub name: String,
}

impl SessionProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Receives finished sessions
pub trait SessionSink: Send + Sync {
    fn record(&self, record: SessionRecord);
}

/// Sink that writes each record to the log as JSON
#[derive(Debug, Default)]
pub struct LogSessionSink;

impl SessionSink for LogSessionSink {
    fn record(&self, record: SessionRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => info!("Session ended: {}", json),
            Err(e) => info!("Session ended: {:?} (serialization failed: {})", record, e),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenSession {
    session_id: String,
    started_at: DateTime<Utc>,
    planned_duration_seconds: u64,
    /// Remaining time when the session opened; below planned after a stop and restart
    opened_remaining_seconds: u64,
    last_remaining_seconds: u64,
    interruptions: u32,
}

/// Builds [`SessionRecord`]s from timer updates
pub struct SessionTracker {
    profile: Mutex<SessionProfile>,
    current: Mutex<Option<OpenSession>>,
    sink: Arc<dyn SessionSink>,
    sequence: AtomicU64,
}

impl SessionTracker {
    pub fn new(profile: SessionProfile, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            profile: Mutex::new(profile),
            current: Mutex::new(None),
            sink,
            sequence: AtomicU64::new(0),
        }
    }

    /// Attribute future sessions to another profile
    pub fn set_profile(&self, profile: SessionProfile) {
        if let Ok(mut current) = self.profile.lock() {
            *current = profile;
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.current.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Feed one timer update, typically from a facade subscription
    pub fn observe(&self, update: &TimerUpdate) {
        let snapshot = &update.snapshot;
        let finished = {
            let Ok(mut current) = self.current.lock() else {
                return;
            };

            if let Some(open) = current.as_mut() {
                if update.event != TimerEvent::Reset {
                    open.last_remaining_seconds = snapshot.remaining_seconds;
                }
            }

            match update.event {
                TimerEvent::Start if current.is_none() => {
                    *current = Some(self.open(snapshot));
                    None
                }
                TimerEvent::Pause => {
                    if let Some(open) = current.as_mut() {
                        open.interruptions += 1;
                    }
                    None
                }
                TimerEvent::Complete => current.take().map(|s| (s, CompletionStatus::Completed)),
                TimerEvent::Stop => current.take().map(|s| (s, CompletionStatus::Cancelled)),
                // a new duration replaced a session that was still going
                TimerEvent::Reset => current.take().map(|s| (s, CompletionStatus::Interrupted)),
                _ => None,
            }
        };

        if let Some((session, status)) = finished {
            self.close(session, status);
        }
    }

    /// Close any open session as interrupted, e.g. when the timer is torn down
    pub fn interrupt(&self) {
        let open = self.current.lock().ok().and_then(|mut current| current.take());
        if let Some(session) = open {
            self.close(session, CompletionStatus::Interrupted);
        }
    }

    fn open(&self, snapshot: &TimerSnapshot) -> OpenSession {
        let started_at = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let session_id = format!("session_{}_{}", started_at.timestamp_millis(), sequence);
        debug!("Session {} opened for {}s", session_id, snapshot.planned_duration_seconds);

        OpenSession {
            session_id,
            started_at,
            planned_duration_seconds: snapshot.planned_duration_seconds,
            opened_remaining_seconds: snapshot.remaining_seconds,
            last_remaining_seconds: snapshot.remaining_seconds,
            interruptions: 0,
        }
    }

    fn close(&self, session: OpenSession, status: CompletionStatus) {
        let profile = self
            .profile
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());

        let actual = match status {
            CompletionStatus::Completed => session.opened_remaining_seconds,
            _ => session
                .opened_remaining_seconds
                .saturating_sub(session.last_remaining_seconds),
        };

        self.sink.record(SessionRecord {
            session_id: session.session_id,
            profile_id: profile.id,
            profile_name: profile.name,
            planned_duration_seconds: session.planned_duration_seconds,
            actual_duration_seconds: actual,
            completion_status: status,
            start_timestamp: session.started_at,
            end_timestamp: Utc::now(),
            interruption_count: session.interruptions,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerState;

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<SessionRecord>>);

    impl SessionSink for MemorySink {
        fn record(&self, record: SessionRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    fn update(state: TimerState, planned: u64, remaining: u64, event: TimerEvent) -> TimerUpdate {
        TimerUpdate {
            snapshot: TimerSnapshot::new(state, planned, remaining * 1000),
            event,
        }
    }

    fn tracker() -> (SessionTracker, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let tracker = SessionTracker::new(SessionProfile::new("work", "Deep Work"), sink.clone());
        (tracker, sink)
    }

    #[test]
    fn test_completed_session_counts_pauses() {
        let (tracker, sink) = tracker();
        tracker.observe(&update(TimerState::Running, 60, 60, TimerEvent::Start));
        tracker.observe(&update(TimerState::Paused, 60, 50, TimerEvent::Pause));
        tracker.observe(&update(TimerState::Running, 60, 50, TimerEvent::Resume));
        tracker.observe(&update(TimerState::Paused, 60, 20, TimerEvent::Pause));
        tracker.observe(&update(TimerState::Running, 60, 20, TimerEvent::Resume));
        tracker.observe(&update(TimerState::Completed, 60, 0, TimerEvent::Complete));

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.completion_status, CompletionStatus::Completed);
        assert_eq!(record.actual_duration_seconds, 60);
        assert_eq!(record.interruption_count, 2);
        assert_eq!(record.profile_name, "Deep Work");
        assert!(record.end_timestamp >= record.start_timestamp);
    }

    #[test]
    fn test_stop_records_cancelled_with_elapsed_time() {
        let (tracker, sink) = tracker();
        tracker.observe(&update(TimerState::Running, 45, 45, TimerEvent::Start));
        tracker.observe(&update(TimerState::Running, 45, 40, TimerEvent::Tick));
        tracker.observe(&update(TimerState::Stopped, 45, 38, TimerEvent::Stop));
        tracker.observe(&update(TimerState::Idle, 45, 45, TimerEvent::Reset));

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].completion_status, CompletionStatus::Cancelled);
        assert_eq!(records[0].actual_duration_seconds, 7);
        assert!(!tracker.is_session_active());
    }

    #[test]
    fn test_restart_after_stop_counts_only_new_stretch() {
        let (tracker, sink) = tracker();
        tracker.observe(&update(TimerState::Running, 45, 45, TimerEvent::Start));
        tracker.observe(&update(TimerState::Stopped, 45, 40, TimerEvent::Stop));
        tracker.observe(&update(TimerState::Running, 45, 40, TimerEvent::Start));
        tracker.observe(&update(TimerState::Stopped, 45, 35, TimerEvent::Stop));
        tracker.observe(&update(TimerState::Running, 45, 35, TimerEvent::Start));
        tracker.observe(&update(TimerState::Completed, 45, 0, TimerEvent::Complete));

        let records = sink.0.lock().unwrap();
        let actual: Vec<u64> = records.iter().map(|r| r.actual_duration_seconds).collect();
        assert_eq!(actual, vec![5, 5, 35]);
        assert!(records.iter().all(|r| r.planned_duration_seconds == 45));
        assert_eq!(records[2].completion_status, CompletionStatus::Completed);
    }

    #[test]
    fn test_interrupt_closes_open_session() {
        let (tracker, sink) = tracker();
        tracker.interrupt();
        assert!(sink.0.lock().unwrap().is_empty());

        tracker.observe(&update(TimerState::Running, 30, 30, TimerEvent::Start));
        tracker.observe(&update(TimerState::Running, 30, 25, TimerEvent::Tick));
        tracker.interrupt();

        let records = sink.0.lock().unwrap();
        assert_eq!(records[0].completion_status, CompletionStatus::Interrupted);
        assert_eq!(records[0].actual_duration_seconds, 5);
    }

    #[test]
    fn test_record_serializes_status_lowercase() {
        let (tracker, sink) = tracker();
        tracker.observe(&update(TimerState::Running, 10, 10, TimerEvent::Start));
        tracker.observe(&update(TimerState::Completed, 10, 0, TimerEvent::Complete));

        let json = serde_json::to_value(&sink.0.lock().unwrap()[0]).unwrap();
        assert_eq!(json["completionStatus"], "completed");
        assert_eq!(json["profileId"], "work");
        assert_eq!(json["interruptionCount"], 0);
    }
}
