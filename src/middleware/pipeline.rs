use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::value::{decode, encode};

/// The continuation handed to a middleware.
///
/// Calling [`Next::run`] passes the (possibly transformed) value on to the
/// rest of the chain. It consumes the continuation, so a middleware can
/// proceed at most once; dropping it without running vetoes the write.
pub struct Next<'a, T> {
    run: Box<dyn FnOnce(T) -> Result<()> + 'a>,
}

impl<'a, T> Next<'a, T> {
    fn new<F>(run: F) -> Self
    where
        F: FnOnce(T) -> Result<()> + 'a,
    {
        Self { run: Box::new(run) }
    }

    pub fn run(self, value: T) -> Result<()> {
        (self.run)(value)
    }
}

/// An interceptor over the untyped value of one key.
pub type Middleware = Arc<dyn Fn(Value, Next<'_, Value>) -> Result<()> + Send + Sync>;

/// Build a [`Middleware`] from a closure.
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(Value, Next<'_, Value>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a typed middleware so it can sit in an untyped chain.
pub fn typed<T, F>(f: F) -> Middleware
where
    T: Serialize + DeserializeOwned + 'static,
    F: Fn(T, Next<'_, T>) -> Result<()> + Send + Sync + 'static,
{
    from_fn(move |value, next| {
        let typed: T = decode(&value)?;
        f(typed, Next::new(move |out: T| next.run(encode(&out)?)))
    })
}

/// Ordered, per-key chains of interceptors.
#[derive(Default)]
pub struct MiddlewarePipeline {
    chains: HashMap<String, Vec<Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` to the chain of `key`.
    pub fn register(&mut self, key: &str, middleware: Middleware) {
        self.chains.entry(key.to_owned()).or_default().push(middleware);
    }

    /// A copy of the chain of `key`, safe to run without holding the pipeline.
    pub fn chain(&self, key: &str) -> Vec<Middleware> {
        self.chains.get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.chains.get(key).map_or(0, Vec::len)
    }
}

/// Run `value` through `chain`.
///
/// Returns the value that reached the end of the chain, or `None` if some
/// middleware declined to continue. An error from any middleware aborts the
/// whole run, even one raised after its continuation returned.
pub fn run(chain: &[Middleware], value: Value) -> Result<Option<Value>> {
    let terminal = RefCell::new(None);
    dispatch(chain, value, &terminal)?;
    Ok(terminal.into_inner())
}

fn dispatch(chain: &[Middleware], value: Value, terminal: &RefCell<Option<Value>>) -> Result<()> {
    match chain.split_first() {
        None => {
            *terminal.borrow_mut() = Some(value);
            Ok(())
        }
        Some((head, rest)) => head(value, Next::new(move |v: Value| dispatch(rest, v, terminal))),
    }
}
