use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use super::{Tick, TickDriver};
use crate::sync::lock;

/// Work to run for one key when the tick fires.
pub type FlushAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Pending {
    actions: HashMap<String, FlushAction>,
    tick_requested: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    driver: Arc<dyn TickDriver>,
    /// Held for a whole flush so ticks never deliver out of order.
    flushing: Mutex<()>,
    /// Thread running the current flush.
    flusher: Mutex<Option<ThreadId>>,
}

/// Clears the flusher when a flush ends, even by unwinding.
struct FlushOwner<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> FlushOwner<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>, id: ThreadId) -> Self {
        *lock(slot) = Some(id);
        Self(slot)
    }
}

impl Drop for FlushOwner<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

/// Coalesces publishes into at most one flush per key per tick.
///
/// Cloning shares the pending set.
#[derive(Clone)]
pub struct BatchScheduler {
    shared: Arc<Shared>,
}

impl BatchScheduler {
    pub fn new(driver: Arc<dyn TickDriver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending::default()),
                driver,
                flushing: Mutex::new(()),
                flusher: Mutex::new(None),
            }),
        }
    }

    /// Store `action` as the flush for `key`.
    ///
    /// An action already pending for the key is replaced. A tick is requested
    /// only when nothing was pending.
    pub fn enqueue(&self, key: &str, action: FlushAction) {
        let request = {
            let mut pending = lock(&self.shared.pending);
            if pending.actions.insert(key.to_owned(), action).is_some() {
                tracing::trace!(key, "coalesced pending flush");
            }
            !std::mem::replace(&mut pending.tick_requested, true)
        };

        if request {
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            self.shared.driver.request_tick(Tick::new(move || {
                if let Some(shared) = weak.upgrade() {
                    Self { shared }.flush();
                }
            }));
        }
    }

    /// Drain the pending set and run each key's action once.
    ///
    /// Actions enqueued while flushing wait for the next tick. Flushes are
    /// serialized: a tick that fires on another thread while one runs waits
    /// for it, so a later value is never delivered before an earlier one. A
    /// flush requested from inside an action returns 0. Returns the number of
    /// actions run.
    pub fn flush(&self) -> usize {
        let current = thread::current().id();
        if *lock(&self.shared.flusher) == Some(current) {
            tracing::trace!("nested flush deferred to the next tick");
            return 0;
        }
        let _serial = lock(&self.shared.flushing);
        let _owner = FlushOwner::enter(&self.shared.flusher, current);

        let actions = {
            let mut pending = lock(&self.shared.pending);
            pending.tick_requested = false;
            std::mem::take(&mut pending.actions)
        };

        let count = actions.len();
        if count > 0 {
            tracing::debug!(keys = count, "flushing pending notifications");
        }
        for (_key, action) in actions {
            action();
        }
        count
    }

    /// Keys with a flush waiting for the next tick.
    pub fn pending_keys(&self) -> Vec<String> {
        lock(&self.shared.pending).actions.keys().cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.shared.pending).actions.is_empty()
    }
}
