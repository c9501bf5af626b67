//! Selector-based publish/subscribe.
//!
//! Subscribers either watch the full value of a key or a slice of it. A
//! selector subscriber is only notified when its slice changes under its
//! equality function.

mod notifier;
mod subscriber;
mod subscription;

pub use notifier::Notifier;
pub use subscriber::{SubscriptionGuard, SubscriptionHandle};
pub use subscription::Subscription;
