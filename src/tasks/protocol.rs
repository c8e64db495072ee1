//! Message schema between the background driver and its worker
//!
//! Commands travel as `{"command": ..., "payload": {...}}` and worker pushes
//! as `{"type": ..., "payload": {...}}`, both JSON encoded. The two sides
//! share no memory; these strings are the only thing that crosses over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::NotificationRequest;

/// Commands sent to the worker. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerCommand {
    Start { duration_seconds: u64, session_id: u64 },
    Pause,
    Resume,
    Stop,
    SetDuration { duration_seconds: u64, session_id: u64 },
    QueryStatus,
}

/// Countdown status reported by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub remaining_seconds: u64,
    pub remaining_milliseconds: u64,
    pub is_running: bool,
    pub is_complete: bool,
    /// Session the worker was last configured for
    pub session_id: u64,
}

/// Messages pushed by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerMessage {
    WorkerReady { initialized: bool },
    TimerTick(WorkerStatus),
    TimerStatus(WorkerStatus),
    TimerCompleted { completed_at: DateTime<Utc>, session_id: u64 },
    RequestCompletionNotification(NotificationRequest),
}

impl WorkerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerCommand::Start { .. } => "START",
            WorkerCommand::Pause => "PAUSE",
            WorkerCommand::Resume => "RESUME",
            WorkerCommand::Stop => "STOP",
            WorkerCommand::SetDuration { .. } => "SET_DURATION",
            WorkerCommand::QueryStatus => "QUERY_STATUS",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl WorkerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
