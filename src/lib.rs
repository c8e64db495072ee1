//! Focus Timer - A drift-corrected countdown timer engine
//!
//! This library provides a pausable countdown state machine whose remaining
//! time is always recomputed from a monotonic clock, driven either in-process
//! or from an isolated background worker, behind a single facade.

pub mod api;
pub mod config;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::{AppState, TimerEvent, TimerSnapshot, TimerState, TimerUpdate};
pub use tasks::{FocusTimer, FocusTimerBuilder, TimerOptions};
pub use utils::signals::shutdown_signal;
