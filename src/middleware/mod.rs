//! Interceptors that run before a write commits.
//!
//! Each key owns an ordered chain. A middleware receives the candidate value
//! and a [`Next`] continuation; it may transform the value, pass it on, or
//! veto the write by not continuing.

mod pipeline;

pub use pipeline::{from_fn, run, typed, Middleware, MiddlewarePipeline, Next};
