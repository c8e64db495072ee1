//! Collaborator services module
//!
//! Things the timer core touches but does not own: the wall-clock source,
//! the environment probe that picks a driver, and notification delivery.

pub mod capability;
pub mod clock;
pub mod notifier;

// Re-export main types
pub use capability::{select_driver, Capabilities, DriverKind, DriverPreference};
pub use clock::{Clock, TokioClock};
pub use notifier::{CompletionNotifier, LogNotifier, NotificationRequest};
