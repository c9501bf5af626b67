use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::subscriber::{Entry, Observer, SubscriptionGuard, SubscriptionHandle};
use crate::scheduler::BatchScheduler;
use crate::sync::{read, write};

/// Per-key subscriber lists.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<String, Vec<Arc<Entry>>>>,
}

impl Registry {
    fn insert(&self, key: &str, label: String, observer: Box<dyn Observer>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        write(&self.subscribers)
            .entry(key.to_owned())
            .or_default()
            .push(Arc::new(Entry::new(id, label, observer)));
        SubscriptionHandle {
            key: key.to_owned(),
            id,
        }
    }

    pub(crate) fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscribers = write(&self.subscribers);
        let Some(list) = subscribers.get_mut(&handle.key) else {
            return false;
        };
        let Some(index) = list.iter().position(|entry| entry.id == handle.id) else {
            return false;
        };
        list.remove(index).deactivate();
        if list.is_empty() {
            subscribers.remove(&handle.key);
        }
        true
    }

    /// The subscriber list of `key` as it stands now.
    fn snapshot(&self, key: &str) -> Vec<Arc<Entry>> {
        read(&self.subscribers)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn count(&self, key: &str) -> usize {
        read(&self.subscribers).get(key).map_or(0, Vec::len)
    }

    /// Offer `value` to every subscriber of `key` and run the deliveries.
    ///
    /// The list is captured up front: subscribers added by a callback wait for
    /// the next publish, subscribers removed by a callback are skipped. A panic
    /// in one subscriber is logged and does not stop the others.
    fn deliver(&self, key: &str, value: &Value) -> usize {
        let mut notified = 0;
        for entry in self.snapshot(key) {
            if !entry.is_active() {
                continue;
            }
            let delivery = match catch_unwind(AssertUnwindSafe(|| entry.observe(value))) {
                Ok(delivery) => delivery,
                Err(panic) => {
                    report(key, &entry, panic);
                    continue;
                }
            };
            if let Some(delivery) = delivery {
                match catch_unwind(AssertUnwindSafe(delivery)) {
                    Ok(()) => notified += 1,
                    Err(panic) => report(key, &entry, panic),
                }
            }
        }
        notified
    }
}

fn report(key: &str, entry: &Entry, panic: Box<dyn Any + Send>) {
    let message = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    tracing::error!(key, subscriber = %entry.label, panic = message, "subscriber panicked");
}

/// Publish/subscribe layer.
///
/// Publishing never notifies synchronously; it parks a flush for the key on
/// the [`BatchScheduler`], which delivers the latest value on the next tick.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<Registry>,
    scheduler: BatchScheduler,
}

impl Notifier {
    pub fn new(scheduler: BatchScheduler) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            scheduler,
        }
    }

    pub(crate) fn subscribe(
        &self,
        key: &str,
        label: String,
        observer: Box<dyn Observer>,
    ) -> SubscriptionHandle {
        let handle = self.registry.insert(key, label, observer);
        tracing::trace!(key, id = handle.id, "subscribed");
        handle
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.registry.remove(handle)
    }

    /// Tie a subscription to a guard that removes it when dropped.
    pub fn guard(&self, handle: SubscriptionHandle) -> SubscriptionGuard {
        SubscriptionGuard::new(handle, Arc::downgrade(&self.registry))
    }

    /// Schedule delivery of `value` to the subscribers of `key`.
    pub fn publish(&self, key: &str, value: Value) {
        let registry = Arc::downgrade(&self.registry);
        let owned_key = key.to_owned();
        self.scheduler.enqueue(
            key,
            Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    let notified = registry.deliver(&owned_key, &value);
                    tracing::trace!(key = %owned_key, notified, "delivered");
                }
            }),
        );
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.registry.count(key)
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }
}
