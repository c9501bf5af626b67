use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::EngineBuilder;
use crate::error::{Error, Result};
use crate::middleware::{self, MiddlewarePipeline, Next};
use crate::persistence::{BackendKind, MemoryStorage, PersistenceAdapter, StorageBackend};
use crate::pubsub::{Notifier, Subscription, SubscriptionGuard, SubscriptionHandle};
use crate::scheduler::{BatchScheduler, ManualDriver, TickDriver};
use crate::store::{KeyType, Snapshot, StateKey, StateStore};
use crate::sync::{read, write};
use crate::value::{decode, encode};

/// Options for [`SharedState::create`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Persist the key to this backend.
    pub persist: Option<BackendKind>,
}

impl CreateOptions {
    pub fn persist(kind: BackendKind) -> Self {
        Self {
            persist: Some(kind),
        }
    }
}

struct Inner {
    store: RwLock<StateStore>,
    pipeline: RwLock<MiddlewarePipeline>,
    notifier: Notifier,
    persistence: PersistenceAdapter,
    hydrated: AtomicBool,
}

/// One shared-state engine.
///
/// Create one per session or request and pass it to whatever needs it;
/// clones share the same state. Writes run middleware, commit, persist and
/// publish in that order. Subscribers hear about a write on the next tick of
/// the engine's [`TickDriver`], or on [`flush`](Self::flush) with the default
/// manual driver.
///
/// # Examples
///
/// ```
/// use keystate::{CreateOptions, SharedState, StateKey};
/// use std::sync::{Arc, Mutex};
///
/// let state = SharedState::new();
/// let counter: StateKey<u32> = StateKey::new("counter");
/// state.create(&counter, 0, CreateOptions::default()).unwrap();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen_clone = seen.clone();
/// state
///     .subscribe(&counter, move |n: &u32| seen_clone.lock().unwrap().push(*n))
///     .unwrap();
///
/// state.set(&counter, 1).unwrap();
/// state.update(&counter, |n| n + 1).unwrap();
/// assert_eq!(state.get(&counter).unwrap(), 2);
///
/// state.flush();
/// assert_eq!(*seen.lock().unwrap(), vec![2]);
/// ```
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Inner>,
}

impl SharedState {
    /// An engine with a manual tick, an in-memory session backend and no
    /// local backend.
    pub fn new() -> Self {
        Self::from_parts(
            None,
            Some(Arc::new(MemoryStorage::new())),
            Arc::new(ManualDriver),
        )
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn from_parts(
        local: Option<Arc<dyn StorageBackend>>,
        session: Option<Arc<dyn StorageBackend>>,
        driver: Arc<dyn TickDriver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(StateStore::new()),
                pipeline: RwLock::new(MiddlewarePipeline::new()),
                notifier: Notifier::new(BatchScheduler::new(driver)),
                persistence: PersistenceAdapter::new(local, session),
                hydrated: AtomicBool::new(false),
            }),
        }
    }

    /// Create `key` with `initial`, unless it already exists.
    ///
    /// With `options.persist` set, the key is bound to that backend and a
    /// stored value, if present and of the right type, replaces the current
    /// one.
    pub fn create<T>(&self, key: &StateKey<T>, initial: T, options: CreateOptions) -> Result<()>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let name = key.name();
        let initial = encode(&initial)?;
        {
            let mut store = write(&self.inner.store);
            store.bind::<T>(name)?;
            let existing = store.try_get(name).map(|current| store.validate(name, current));
            match existing {
                None => {
                    store.create(name, initial);
                    tracing::debug!(key = name, "created");
                }
                Some(Err(error)) => {
                    tracing::warn!(key = name, %error, "replacing hydrated value of the wrong shape");
                    store.set(name, initial)?;
                }
                Some(Ok(())) => {}
            }
        }

        let Some(kind) = options.persist else {
            return Ok(());
        };
        let persistence = &self.inner.persistence;
        persistence.set_persistence(name, kind);
        if let Some(persisted) = persistence.get_persisted_value(name) {
            if let Err(error) = write(&self.inner.store).set(name, persisted.clone()) {
                tracing::warn!(key = name, %error, "ignoring persisted value of the wrong shape");
                return Ok(());
            }
            tracing::debug!(key = name, backend = %kind, "restored persisted value");
            self.inner.notifier.publish(name, persisted);
        }
        Ok(())
    }

    /// Current value of `key`.
    pub fn get<T>(&self, key: &StateKey<T>) -> Result<T>
    where
        T: DeserializeOwned + 'static,
    {
        let store = read(&self.inner.store);
        store.check_type(key.name(), KeyType::of::<T>())?;
        decode(store.get(key.name())?)
    }

    /// Current value of `key`, or `None` if it was never created.
    pub fn try_get<T>(&self, key: &StateKey<T>) -> Result<Option<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let store = read(&self.inner.store);
        store.check_type(key.name(), KeyType::of::<T>())?;
        store.try_get(key.name()).map(decode).transpose()
    }

    /// Write `value` to `key`.
    ///
    /// A middleware veto is not an error: the call succeeds and nothing
    /// changes.
    pub fn set<T>(&self, key: &StateKey<T>, value: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        read(&self.inner.store).check_type(key.name(), KeyType::of::<T>())?;
        self.write_value(key.name(), encode(&value)?)
    }

    /// Write the result of `f` applied to the current value of `key`.
    pub fn update<T, F>(&self, key: &StateKey<T>, f: F) -> Result<()>
    where
        T: Serialize + DeserializeOwned + 'static,
        F: FnOnce(T) -> T,
    {
        let previous = self.get(key)?;
        self.set(key, f(previous))
    }

    /// Run middleware, then commit, persist and publish. The store rejects a
    /// merged result that does not fit the key's bound type, so untyped
    /// writers and middleware cannot change the type of a key.
    fn write_value(&self, name: &str, candidate: serde_json::Value) -> Result<()> {
        if !read(&self.inner.store).contains(name) {
            return Err(Error::KeyNotFound(name.to_owned()));
        }

        let chain = read(&self.inner.pipeline).chain(name);
        let Some(value) = middleware::run(&chain, candidate)? else {
            tracing::debug!(key = name, "write vetoed by middleware");
            return Ok(());
        };

        let committed = write(&self.inner.store).commit(name, value)?;
        self.inner.persistence.persist_value(name, &committed);
        self.inner.notifier.publish(name, committed);
        Ok(())
    }

    /// Subscribe to every accepted write of `key`.
    pub fn subscribe<T, F>(&self, key: &StateKey<T>, callback: F) -> Result<SubscriptionHandle>
    where
        T: Clone + Send + DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with(key, Subscription::full(callback))
    }

    /// Subscribe to the slice of `key` picked by `selector`; notified only
    /// when the slice changes.
    pub fn subscribe_select<T, S, P, F>(
        &self,
        key: &StateKey<T>,
        selector: P,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        T: DeserializeOwned + 'static,
        S: PartialEq + Clone + Send + 'static,
        P: Fn(&T) -> S + Send + Sync + 'static,
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.subscribe_with(key, Subscription::select(selector, callback))
    }

    /// Subscribe with a fully described [`Subscription`].
    pub fn subscribe_with<T, S>(
        &self,
        key: &StateKey<T>,
        subscription: Subscription<T, S>,
    ) -> Result<SubscriptionHandle>
    where
        T: DeserializeOwned + 'static,
        S: Clone + Send + 'static,
    {
        let current = {
            let store = read(&self.inner.store);
            store.check_type(key.name(), KeyType::of::<T>())?;
            store.get(key.name())?.clone()
        };
        let (label, observer) = subscription.into_observer(key.name(), &current);
        Ok(self
            .inner
            .notifier
            .subscribe(key.name(), label, Box::new(observer)))
    }

    /// Stop a subscription. Returns `false` if it was already stopped.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.inner.notifier.unsubscribe(handle)
    }

    /// Tie a subscription to a guard that stops it when dropped.
    pub fn guard(&self, handle: SubscriptionHandle) -> SubscriptionGuard {
        self.inner.notifier.guard(handle)
    }

    pub fn subscriber_count<T>(&self, key: &StateKey<T>) -> usize {
        self.inner.notifier.subscriber_count(key.name())
    }

    /// Append a middleware to the chain of `key`.
    pub fn add_middleware<T, F>(&self, key: &StateKey<T>, f: F)
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn(T, Next<'_, T>) -> Result<()> + Send + Sync + 'static,
    {
        write(&self.inner.pipeline).register(key.name(), middleware::typed(f));
    }

    /// Point-in-time copy of every key.
    pub fn snapshot(&self) -> Snapshot {
        read(&self.inner.store).snapshot()
    }

    /// Seed this engine from a snapshot taken elsewhere.
    ///
    /// Snapshot values overwrite existing ones, so a later `create` keeps
    /// them. A value that does not fit the type its key is already bound to
    /// is skipped. Readers that must not see defaults should wait for
    /// [`is_hydrated`](Self::is_hydrated).
    pub fn hydrate(&self, snapshot: Snapshot) {
        let accepted: Vec<_> = {
            let mut store = write(&self.inner.store);
            snapshot
                .into_iter()
                .filter(|(key, value)| match store.set(key, value.clone()) {
                    Ok(_) => true,
                    Err(error) => {
                        tracing::warn!(key = %key, %error, "skipping hydrated value of the wrong shape");
                        false
                    }
                })
                .collect()
        };
        let count = accepted.len();
        for (key, value) in accepted {
            self.inner.notifier.publish(&key, value);
        }
        self.inner.hydrated.store(true, Ordering::SeqCst);
        tracing::debug!(keys = count, "hydrated");
    }

    pub fn is_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::SeqCst)
    }

    /// Whether `name` was created or hydrated.
    pub fn contains(&self, name: &str) -> bool {
        read(&self.inner.store).contains(name)
    }

    /// Run pending notifications now. Returns the number of keys flushed.
    pub fn flush(&self) -> usize {
        self.inner.notifier.scheduler().flush()
    }

    /// Whether any notification is waiting for the next tick.
    pub fn has_pending(&self) -> bool {
        !self.inner.notifier.scheduler().is_idle()
    }

    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.inner.persistence
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("keys", &read(&self.inner.store).len())
            .field("hydrated", &self.is_hydrated())
            .finish()
    }
}
