//! Completion notification forwarding

use serde::{Deserialize, Serialize};
use tracing::info;

/// A request to surface a user-facing notification when a countdown finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub require_interaction: bool,
}

impl NotificationRequest {
    pub fn timer_completed() -> Self {
        Self {
            title: "Timer Completed!".to_string(),
            body: "Your focus session has finished.".to_string(),
            require_interaction: true,
        }
    }
}

/// Collaborator that actually delivers notifications
pub trait CompletionNotifier: Send + Sync {
    fn notify(&self, request: &NotificationRequest);
}

/// Writes notification requests to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self, request: &NotificationRequest) {
        info!(
            "Notification requested: {} - {} (require_interaction={})",
            request.title, request.body, request.require_interaction
        );
    }
}
