//! Countdown drivers module
//!
//! This module contains the strategies that run a countdown over time: the
//! in-process local driver, the background worker with its message protocol,
//! and the facade that picks one of them.

pub mod background_driver;
pub mod driver;
pub mod facade;
pub mod local_driver;
pub mod protocol;
pub mod worker;

// Re-export main types
pub use background_driver::BackgroundDriver;
pub use driver::{TimerDriver, TimerOptions, DEFAULT_POLL_INTERVAL};
pub use facade::{FocusTimer, FocusTimerBuilder};
pub use local_driver::LocalDriver;
pub use protocol::{WorkerCommand, WorkerMessage, WorkerStatus};
pub use worker::{spawn_worker, DriverError, WorkerChannels, WorkerSpawner};
