//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{extract::State, response::Json};
use tracing::info;

use crate::{state::AppState, tasks::FocusTimer};
use super::responses::{DurationRequest, HealthResponse, StatusResponse, TimerResponse};

/// Run one timer command and report the resulting snapshot
///
/// Commands never fail; one that is invalid for the current state simply
/// leaves the snapshot unchanged.
fn apply(state: &AppState, action: &str, command: impl FnOnce(&FocusTimer)) -> Json<TimerResponse> {
    command(&state.timer);
    state.record_action(action);

    let snapshot = state.timer.snapshot();
    info!("{} endpoint called - timer is {}", action, snapshot.state);
    Json(TimerResponse::new(action, snapshot))
}

/// Handle POST /timer/duration - Configure a fresh countdown
pub async fn duration_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DurationRequest>,
) -> Json<TimerResponse> {
    apply(&state, "duration", |timer| timer.set_duration_seconds(request.seconds))
}

/// Handle POST /timer/start
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "start", FocusTimer::start)
}

/// Handle POST /timer/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "pause", FocusTimer::pause)
}

/// Handle POST /timer/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "resume", FocusTimer::resume)
}

/// Handle POST /timer/stop
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "stop", FocusTimer::stop)
}

/// Handle POST /timer/reset
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "reset", FocusTimer::reset)
}

/// Handle POST /timer/refresh - Resynchronize with a background worker
pub async fn refresh_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    apply(&state, "refresh", FocusTimer::refresh)
}

/// Handle GET /timer - Return the current snapshot and server status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timer = state.timer.snapshot();
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        formatted: timer.formatted(),
        progress_percentage: timer.progress_percentage(),
        timer,
        driver: state.timer.driver_kind(),
        session_active: state.tracker.is_session_active(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
