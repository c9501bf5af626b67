/// A deferred flush, handed to a [`TickDriver`] to run on the next tick.
pub struct Tick {
    run: Box<dyn FnOnce() + Send>,
}

impl Tick {
    pub(crate) fn new<F>(run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Run the flush.
    pub fn run(self) {
        (self.run)();
    }
}

/// The host's task queue.
///
/// The scheduler requests one tick whenever its pending set goes from empty to
/// non-empty. A driver must never run the tick inside `request_tick` itself,
/// so that notification stays deferred relative to the write.
pub trait TickDriver: Send + Sync {
    fn request_tick(&self, tick: Tick);
}

/// Driver for hosts without an event loop.
///
/// Ticks are dropped; pending work waits for an explicit
/// [`SharedState::flush`](crate::SharedState::flush).
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualDriver;

impl TickDriver for ManualDriver {
    fn request_tick(&self, _tick: Tick) {}
}

/// Driver that spawns each tick as a task on a tokio runtime.
///
/// On a multi-thread runtime two ticks may run at once; the scheduler
/// serializes their flushes, so delivery order still follows write order.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioDriver {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioDriver {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> crate::Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| crate::Error::Config(format!("no tokio runtime: {e}")))
    }
}

#[cfg(feature = "tokio")]
impl TickDriver for TokioDriver {
    fn request_tick(&self, tick: Tick) {
        self.handle.spawn(async move { tick.run() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_driver_never_runs_the_tick() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        ManualDriver.request_tick(Tick::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
