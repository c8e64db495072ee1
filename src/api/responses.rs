//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{services::DriverKind, state::TimerSnapshot};

/// Body accepted by `POST /timer/duration`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationRequest {
    /// Negative values are clamped to zero
    pub seconds: i64,
}

/// API response structure for timer command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub formatted: String,
    pub timer: TimerSnapshot,
}

impl TimerResponse {
    pub fn new(action: &str, timer: TimerSnapshot) -> Self {
        Self {
            action: action.to_string(),
            timestamp: Utc::now(),
            formatted: timer.formatted(),
            timer,
        }
    }
}

/// Full status response with server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub formatted: String,
    pub progress_percentage: u8,
    pub driver: DriverKind,
    pub session_active: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
