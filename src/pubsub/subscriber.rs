use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::notifier::Registry;

/// A notification ready to be delivered, detached from any lock.
pub(crate) type Delivery = Box<dyn FnOnce() + Send>;

/// Decides whether a published value concerns one subscriber.
pub(crate) trait Observer: Send {
    /// Returns the delivery to run when the observed slice changed.
    fn observe(&mut self, value: &Value) -> Option<Delivery>;
}

/// Projects the full value to a slice and compares it with the last one.
pub(crate) struct SliceObserver<S> {
    select: Box<dyn Fn(&Value) -> Option<S> + Send>,
    equal: Box<dyn Fn(&S, &S) -> bool + Send>,
    callback: Arc<dyn Fn(&S) + Send + Sync>,
    last: Option<S>,
}

impl<S: Clone + Send + 'static> SliceObserver<S> {
    pub(crate) fn new(
        select: Box<dyn Fn(&Value) -> Option<S> + Send>,
        equal: Box<dyn Fn(&S, &S) -> bool + Send>,
        callback: Arc<dyn Fn(&S) + Send + Sync>,
        baseline: Option<S>,
    ) -> Self {
        Self {
            select,
            equal,
            callback,
            last: baseline,
        }
    }
}

impl<S: Clone + Send + 'static> Observer for SliceObserver<S> {
    fn observe(&mut self, value: &Value) -> Option<Delivery> {
        let next = (self.select)(value)?;
        if let Some(last) = &self.last {
            if (self.equal)(last, &next) {
                return None;
            }
        }
        self.last = Some(next.clone());
        let callback = Arc::clone(&self.callback);
        Some(Box::new(move || callback(&next)))
    }
}

/// One registered subscriber.
pub(crate) struct Entry {
    pub(crate) id: u64,
    pub(crate) label: String,
    active: AtomicBool,
    observer: Mutex<Box<dyn Observer>>,
}

impl Entry {
    pub(crate) fn new(id: u64, label: String, observer: Box<dyn Observer>) -> Self {
        Self {
            id,
            label,
            active: AtomicBool::new(true),
            observer: Mutex::new(observer),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn observe(&self, value: &Value) -> Option<Delivery> {
        crate::sync::lock(&self.observer).observe(value)
    }
}

/// Opaque token identifying one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) key: String,
    pub(crate) id: u64,
}

impl SubscriptionHandle {
    /// The key this subscription listens to.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Unsubscribes when dropped.
///
/// Holds only a weak reference to the subscriber registry, so a guard that
/// outlives its engine is harmless.
pub struct SubscriptionGuard {
    handle: SubscriptionHandle,
    registry: Weak<Registry>,
}

impl SubscriptionGuard {
    pub(crate) fn new(handle: SubscriptionHandle, registry: Weak<Registry>) -> Self {
        Self { handle, registry }
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.handle);
        }
    }
}
