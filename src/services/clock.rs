//! Wall-clock time source

use tokio::time::Instant;

/// Source of the current instant for countdown drivers
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio runtime
///
/// Follows the runtime's clock, so a paused test runtime controls it too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
