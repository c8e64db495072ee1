//! Subscription registry and ordered update delivery

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

use super::timer_state::{TimerEvent, TimerSnapshot, TimerUpdate};

type ListenerFn = Arc<dyn Fn(&TimerUpdate) + Send + Sync>;

/// A panicking listener never leaves the table unusable
fn lock_table(table: &Mutex<ListenerTable>) -> MutexGuard<'_, ListenerTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, ListenerFn)>,
}

/// Set of callbacks interested in timer updates
#[derive(Clone, Default)]
pub struct Listeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Keep the returned handle to unsubscribe later.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TimerUpdate) + Send + Sync + 'static,
    {
        let mut table = lock_table(&self.table);
        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, Arc::new(listener)));

        Subscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Deliver one update to every listener
    ///
    /// A panicking listener is logged and skipped; the rest still receive the
    /// update. The table lock is not held while callbacks run, so a callback
    /// may subscribe or unsubscribe.
    pub fn notify(&self, update: &TimerUpdate) {
        let entries: Vec<(u64, ListenerFn)> = lock_table(&self.table).entries.clone();

        for (id, listener) in entries {
            if catch_unwind(AssertUnwindSafe(|| listener(update))).is_err() {
                error!("Timer listener {} panicked while handling {:?}", id, update.event);
            }
        }
    }

    pub fn clear(&self) {
        lock_table(&self.table).entries.clear();
    }

    pub fn len(&self) -> usize {
        lock_table(&self.table).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Listeners::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(table) = self.table.upgrade() {
            lock_table(&table).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Producer side of the ordered update queue
///
/// Drivers push updates while holding their own state lock, so the queue
/// order is exactly the order in which transitions happened.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<TimerUpdate>,
}

impl UpdateSender {
    pub fn emit(&self, snapshot: TimerSnapshot, event: TimerEvent) {
        if self.tx.send(TimerUpdate { snapshot, event }).is_err() {
            debug!("Update dispatcher closed, dropping {:?}", event);
        }
    }
}

/// Start the task that drains the queue into `listeners`
pub fn spawn_dispatcher(listeners: Listeners) -> (UpdateSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<TimerUpdate>();

    let handle = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            listeners.notify(&update);
        }
        debug!("Update dispatcher finished");
    });

    (UpdateSender { tx }, handle)
}
