//! The engine façade.
//!
//! [`SharedState`] ties the store, middleware pipeline, persistence adapter,
//! notifier and scheduler together behind create/get/set/subscribe.

mod builder;
mod engine;

pub use builder::EngineBuilder;
pub use engine::{CreateOptions, SharedState};
