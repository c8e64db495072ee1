//! Timer state module
//!
//! Timer data and logic: the countdown state machine, the snapshot and
//! event types it produces, listener delivery, session records, and the
//! application state shared with the HTTP layer.

pub mod app_state;
pub mod listeners;
pub mod machine;
pub mod session;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use listeners::{spawn_dispatcher, Listeners, Subscription, UpdateSender};
pub use machine::{CountdownMachine, TransitionError};
pub use session::{
    CompletionStatus, LogSessionSink, SessionProfile, SessionRecord, SessionSink, SessionTracker,
};
pub use timer_state::{
    TimerEvent, TimerSnapshot, TimerState, TimerUpdate, MAX_DURATION_SECONDS,
};
