use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::subscriber::SliceObserver;
use crate::value::decode;

const ANONYMOUS: &str = "anonymous";

/// Description of a subscriber: what it selects, how slices compare, and what
/// to call when the slice changes.
///
/// # Examples
///
/// ```
/// use keystate::Subscription;
///
/// #[derive(Clone, serde::Deserialize)]
/// struct Profile {
///     name: String,
///     visits: u32,
/// }
///
/// let name_changes = Subscription::select(
///     |p: &Profile| p.name.clone(),
///     |name: &String| println!("name is now {name}"),
/// )
/// .label("NameBadge");
/// # let _ = name_changes;
/// ```
pub struct Subscription<T, S> {
    select: Box<dyn Fn(&T) -> S + Send + Sync>,
    equal: Box<dyn Fn(&S, &S) -> bool + Send + Sync>,
    callback: Arc<dyn Fn(&S) + Send + Sync>,
    label: Option<String>,
    full: bool,
}

impl<T: Clone + 'static> Subscription<T, T> {
    /// Notified with the full value on every accepted publish.
    pub fn full<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            select: Box::new(T::clone),
            equal: Box::new(|_: &T, _: &T| false),
            callback: Arc::new(callback),
            label: None,
            full: true,
        }
    }
}

impl<T: 'static, S: PartialEq + 'static> Subscription<T, S> {
    /// Notified with the selected slice whenever it changes.
    pub fn select<P, F>(selector: P, callback: F) -> Self
    where
        P: Fn(&T) -> S + Send + Sync + 'static,
        F: Fn(&S) + Send + Sync + 'static,
    {
        Self {
            select: Box::new(selector),
            equal: Box::new(|a: &S, b: &S| a == b),
            callback: Arc::new(callback),
            label: None,
            full: false,
        }
    }
}

impl<T: 'static, S: 'static> Subscription<T, S> {
    /// Replace the slice comparison. Ignored for full-value subscriptions.
    pub fn equality<E>(mut self, equal: E) -> Self
    where
        E: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        if !self.full {
            self.equal = Box::new(equal);
        }
        self
    }

    /// Name used for this subscriber in log output.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Build the type-erased observer, computing the baseline slice from
    /// `current` for selector subscriptions.
    pub(crate) fn into_observer(self, key: &str, current: &Value) -> (String, SliceObserver<S>)
    where
        T: DeserializeOwned,
        S: Clone + Send,
    {
        let label = self.label.unwrap_or_else(|| ANONYMOUS.to_owned());
        let project = {
            let key = key.to_owned();
            let label = label.clone();
            let select = self.select;
            move |value: &Value| match decode::<T>(value) {
                Ok(typed) => Some(select(&typed)),
                Err(error) => {
                    tracing::warn!(key = %key, subscriber = %label, %error, "published value does not match subscriber type");
                    None
                }
            }
        };

        let baseline = if self.full {
            None
        } else {
            project(current)
        };

        let equal = self.equal;
        let observer = SliceObserver::new(
            Box::new(project),
            Box::new(move |a: &S, b: &S| equal(a, b)),
            self.callback,
            baseline,
        );
        (label, observer)
    }
}
